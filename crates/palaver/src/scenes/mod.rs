pub mod chat;
pub mod home;
pub mod login;
pub mod profile;

use palaver_worker::UserProfile;

/// Which screen the main loop shows next. The stack is flat: login until a
/// session exists, then home, with conversation and profile reached from
/// there.
pub enum Scene {
    Login,
    Home,
    Chat(UserProfile),
    Profile,
    Quit,
}
