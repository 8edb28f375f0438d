//! Transient one-line notices, the terminal's stand-in for toasts. Never
//! fatal; every failure is scoped to the operation that triggered it.

use owo_colors::OwoColorize;

pub fn success(message: &str) {
    println!("✅ {}", message.green());
}

pub fn danger(message: &str) {
    println!("❌ {}", message.red());
}

pub fn info(message: &str) {
    println!("{}", message.dimmed());
}
