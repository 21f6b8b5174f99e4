use crate::clients::ClientRegistry;
use crate::state::SharedState;

pub async fn cmd_clients(state: &SharedState) -> anyhow::Result<()> {
    let settings = state.store.list_enabled_clients().await?;
    let registry = ClientRegistry::build(settings, &state.sessions);

    if registry.is_empty() {
        println!("No download clients enabled.");
        println!("Add one under [[download_clients]] in config.toml");
        return Ok(());
    }

    for client in registry.enabled() {
        let settings = client.settings();
        match client.test_connection().await {
            Ok(version) => println!(
                "✓ {} ({}, {}) - version {version}",
                settings.name,
                settings.kind,
                settings.base_url()
            ),
            Err(e) => println!(
                "✗ {} ({}, {}) - {e}",
                settings.name,
                settings.kind,
                settings.base_url()
            ),
        }
    }

    Ok(())
}
