use anyhow::Result;

use traypet::config::{CharacterCatalog, ConfigStore, JsonConfigStore, DEFAULT_CHARACTER};

fn main() -> Result<()> {
    println!("Checking traypet configuration...");

    let catalog = CharacterCatalog::discover();
    match &catalog {
        Some(catalog) => println!("  ✓ Assets: {}", catalog.root().display()),
        None => println!("  ✗ Assets: no assets/ directory next to the working directory or executable"),
    }

    let store = JsonConfigStore::new(None, catalog.clone());
    let path = store.path();
    if path.exists() {
        println!("  ✓ Config: {}", path.display());
    } else {
        println!("  ✗ Config: {} (not written yet, using defaults)", path.display());
    }

    let config = store.load();
    println!("\nResolved configuration:");
    println!("  interval: {} ms", config.interval);
    println!("  soundVolume: {}", config.sound_volume);
    println!("  character: {}", config.character);
    println!("  showPet: {}", config.show_pet);
    if config.birthday.is_set() {
        println!(
            "  birthday: {:04}-{:02}-{:02}",
            config.birthday.year, config.birthday.month, config.birthday.day
        );
    } else {
        println!("  birthday: unset");
    }

    if let Some(catalog) = &catalog {
        println!("\nInstalled characters:");
        for name in catalog.characters() {
            let marker = if name == DEFAULT_CHARACTER { " (default)" } else { "" };
            println!("  - {}{}", name, marker);
        }
    }

    Ok(())
}
