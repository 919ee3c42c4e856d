//! `wildchat personalities` — manage the personality store from the CLI.

use std::error::Error;
use std::path::Path;

use crate::core::personality::{Personality, PersonalityProfile, PersonalityStore};

pub fn list_personalities(path: &Path) -> Result<(), Box<dyn Error>> {
    let store = PersonalityStore::load(path)?;

    println!("Personalities (from {}):\n", path.display());
    if store.is_empty() {
        println!("  No personalities found.");
        println!("\n💡 Add one with:");
        println!("   wildchat personalities add <name> <system prompt text>");
    } else {
        for personality in store.list() {
            println!("  • {} — {}", personality.name, personality.preview());
        }
        println!("\n💡 Use one with:");
        println!("   wildchat --personality <name>");
    }
    Ok(())
}

pub fn add_personality(path: &Path, name: String, content: Vec<String>) -> Result<(), Box<dyn Error>> {
    let content = content.join(" ");
    if content.trim().is_empty() {
        eprintln!("Usage: wildchat personalities add <name> <system prompt text>");
        std::process::exit(1);
    }

    let mut store = PersonalityStore::load(path)?;
    store.add(Personality::new(name.clone(), content))?;
    store.save()?;
    println!("✅ Added personality '{name}'");
    Ok(())
}

pub fn remove_personality(path: &Path, name: &str) -> Result<(), Box<dyn Error>> {
    let mut store = PersonalityStore::load(path)?;
    if !store.remove(name) {
        eprintln!("❌ Personality '{name}' not found");
        std::process::exit(1);
    }
    store.save()?;
    println!("✅ Removed personality '{name}'");
    Ok(())
}

pub fn show_personality(path: &Path, name: &str) -> Result<(), Box<dyn Error>> {
    let store = PersonalityStore::load(path)?;
    let Some(personality) = store.find(name) else {
        eprintln!("❌ Personality '{name}' not found");
        std::process::exit(1);
    };

    println!("{}", personality.name);
    match PersonalityProfile::from_content(&personality.content) {
        Some(profile) => {
            if !profile.summary.is_empty() {
                println!("  {}", profile.summary);
            }
            if !profile.identity.who.is_empty() {
                println!("  Who: {}", profile.identity.who);
            }
            if !profile.identity.values.is_empty() {
                println!("  Values: {}", profile.identity.values);
            }
            if !profile.identity.goals.is_empty() {
                println!("  Goals: {}", profile.identity.goals);
            }
            if !profile.style.tone.is_empty() {
                println!("  Tone: {} (humor {}/100)", profile.style.tone, profile.style.humor);
            }
            if !profile.traits.specialties.is_empty() {
                println!("  Specialties: {}", profile.traits.specialties);
            }
        }
        None => {
            for line in personality.content.lines() {
                println!("  {line}");
            }
        }
    }
    Ok(())
}
