use color_eyre::Result;
use owo_colors::OwoColorize;

use palaver_worker::{PalaverWorker, ProfileUpdate, UserProfile};

use crate::input::{read_line, read_line_or_keep};
use crate::scenes::Scene;
use crate::toast;

pub async fn run(worker: &PalaverWorker) -> Result<Scene> {
    loop {
        let profile = match worker.load_profile().await {
            Ok(profile) => profile.unwrap_or_default(),
            Err(e) => {
                toast::danger(&e.to_string());
                UserProfile::default()
            }
        };

        println!();
        println!("{}", "Profile".bold());
        println!("  Name:    {}", profile.full_name);
        println!("  Bio:     {}", profile.display_bio());
        println!("  Phone:   {}", profile.phone_number);
        println!("  Email:   {}", profile.email);
        println!("  Picture: {}", profile.profile_picture);
        println!();
        println!("{}", "e edit · o log out · b back".dimmed());

        match read_line("> ")?.trim() {
            "e" => edit(worker, &profile).await?,
            "o" => {
                match worker.sign_out().await {
                    Ok(()) => return Ok(Scene::Login),
                    Err(e) => toast::danger(&e.to_string()),
                }
            }
            "b" => return Ok(Scene::Home),
            "" => {}
            _ => toast::danger("Invalid choice"),
        }
    }
}

async fn edit(worker: &PalaverWorker, current: &UserProfile) -> Result<()> {
    let full_name = read_line_or_keep("Full name", &current.full_name)?;
    let bio = read_line_or_keep("Bio", current.bio.as_deref().unwrap_or(""))?;
    let phone_number = read_line_or_keep("Phone number", &current.phone_number)?;

    if full_name.is_empty() || phone_number.is_empty() {
        toast::danger("Make sure to fill in all fields.");
        return Ok(());
    }

    // The terminal's picker: a path, or blank to keep the current picture.
    let avatar_path = read_line("New picture path (blank to keep): ")?;
    let avatar = if avatar_path.is_empty() {
        None
    } else {
        match std::fs::read(&avatar_path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                toast::danger(&format!("Could not read {avatar_path}: {e}"));
                return Ok(());
            }
        }
    };

    let update = ProfileUpdate {
        full_name,
        bio,
        phone_number,
        profile_picture: current.profile_picture.clone(),
        avatar,
    };

    match worker.save_profile(update).await {
        Ok(()) => toast::success("Profile updated successfully!"),
        Err(e) => toast::danger(&e.to_string()),
    }
    Ok(())
}
