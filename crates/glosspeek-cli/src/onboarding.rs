//! Onboarding wizard for first-run setup
//!
//! Guides new users through provider selection, API key entry, and target
//! language before the reader opens for the first time.

use console::style;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};

use glosspeek_core::SettingsStore;
use glosspeek_core::provider::catalog;

/// Run the wizard and persist the answers. Returns early if the user backs
/// out of the provider prompt.
pub fn run(store: &SettingsStore) -> anyhow::Result<()> {
    println!();
    println!("{}", style("Welcome to Glosspeek").bold());
    println!("Select text in the reader and a translation tooltip appears.");
    println!();

    let theme = ColorfulTheme::default();
    let providers = catalog::all();
    let mut items: Vec<String> = providers
        .iter()
        .map(|p| format!("{} ({})", p.name, p.base_url))
        .collect();
    items.push("Custom (enter a base URL)".to_string());

    let picked = Select::with_theme(&theme)
        .with_prompt("API provider")
        .items(&items)
        .default(0)
        .interact()?;

    let base_url: String = match providers.get(picked) {
        Some(provider) => provider.base_url.clone(),
        None => Input::with_theme(&theme)
            .with_prompt("Base URL")
            .with_initial_text("https://")
            .interact_text()?,
    };

    let api_key = Password::with_theme(&theme)
        .with_prompt("API key (stored locally, leave empty to set later)")
        .allow_empty_password(true)
        .interact()?;

    let target_language: String = Input::with_theme(&theme)
        .with_prompt("Target language code (es, fr, de, ja, ...)")
        .default("es".to_string())
        .interact_text()?;

    let enable = Confirm::with_theme(&theme)
        .with_prompt("Enable Glosspeek now?")
        .default(true)
        .interact()?;

    store.update(|s| {
        s.base_url = base_url;
        s.api_key = api_key;
        s.target_language = target_language;
        s.enabled = enable;
    })?;

    println!();
    println!(
        "{} Settings saved to {}",
        style("✓").green(),
        store.path().display()
    );
    Ok(())
}
