use color_eyre::Result;

use palaver_worker::PalaverWorker;

use crate::input::read_line;
use crate::scenes::Scene;
use crate::toast;

pub async fn run(worker: &PalaverWorker) -> Result<Scene> {
    println!();
    println!("Hi there! Welcome to Palaver");
    println!("Please enter a valid email and password to continue.");

    loop {
        println!();
        println!("  1. Sign in");
        println!("  2. Sign up");
        println!("  0. Exit");

        match read_line("Choice: ")?.trim() {
            "1" => {
                if let Some(scene) = sign_in(worker).await? {
                    return Ok(scene);
                }
            }
            "2" => {
                if let Some(scene) = sign_up(worker).await? {
                    return Ok(scene);
                }
            }
            "0" => return Ok(Scene::Quit),
            _ => toast::danger("Invalid choice"),
        }
    }
}

async fn sign_in(worker: &PalaverWorker) -> Result<Option<Scene>> {
    let email = read_line("Email: ")?;
    let password = read_line("Password: ")?;

    if email.is_empty() || password.is_empty() {
        toast::danger("Make sure to fill in all fields.");
        return Ok(None);
    }

    match worker.sign_in(&email, &password).await {
        Ok(_) => Ok(Some(Scene::Home)),
        Err(e) => {
            toast::danger(&e.to_string());
            Ok(None)
        }
    }
}

async fn sign_up(worker: &PalaverWorker) -> Result<Option<Scene>> {
    let email = read_line("Email: ")?;
    let password = read_line("Password: ")?;
    let confirm = read_line("Confirm password: ")?;

    if email.is_empty() || password.is_empty() || confirm.is_empty() {
        toast::danger("Make sure to fill in all fields.");
        return Ok(None);
    }
    if password != confirm {
        toast::danger("Passwords do not match.");
        return Ok(None);
    }

    match worker.sign_up(&email, &password).await {
        Ok(_) => {
            toast::success("Account created successfully.");
            Ok(Some(Scene::Home))
        }
        Err(e) => {
            toast::danger(&e.to_string());
            Ok(None)
        }
    }
}
