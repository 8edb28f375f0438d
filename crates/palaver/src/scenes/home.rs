use color_eyre::Result;
use owo_colors::OwoColorize;

use palaver_worker::{PalaverWorker, UserProfile, filter_by_name};

use crate::input::read_line;
use crate::scenes::Scene;
use crate::toast;

/// The chat list: everyone in the directory, searchable by name. Picking
/// an entry opens the conversation.
pub async fn run(worker: &PalaverWorker) -> Result<Scene> {
    let mut users: Vec<UserProfile> = match worker.load_directory().await {
        Ok(users) => users,
        Err(e) => {
            toast::danger(&e.to_string());
            Vec::new()
        }
    };
    let mut visible = users.clone();

    loop {
        println!();
        println!("{}", "Chats".bold());
        if visible.is_empty() {
            toast::info("No users found");
        }
        for (i, user) in visible.iter().enumerate() {
            println!(
                "  {}. {}  {}  — {}",
                i + 1,
                user.full_name,
                user.presence().dimmed(),
                user.display_bio().dimmed(),
            );
        }
        println!();
        println!("{}", "number opens a chat · /search <name> · p profile · r refresh · q quit".dimmed());

        let line = read_line("> ")?;
        let line = line.trim();

        match line {
            "q" => return Ok(Scene::Quit),
            "p" => return Ok(Scene::Profile),
            "r" => {
                match worker.load_directory().await {
                    Ok(fresh) => {
                        users = fresh;
                        visible = users.clone();
                    }
                    Err(e) => toast::danger(&e.to_string()),
                }
            }
            "" => {}
            _ if line.starts_with("/search") => {
                let query = line.trim_start_matches("/search").trim();
                visible = if query.is_empty() {
                    users.clone()
                } else {
                    filter_by_name(&users, query)
                };
            }
            _ => match line.parse::<usize>() {
                Ok(n) if n >= 1 && n <= visible.len() => {
                    return Ok(Scene::Chat(visible[n - 1].clone()));
                }
                _ => toast::danger("Invalid choice"),
            },
        }
    }
}
