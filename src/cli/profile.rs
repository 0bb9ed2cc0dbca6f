// src/cli/profile.rs — Profile administration

use crate::cli::{open_store, ProfileAction};
use crate::infra::config::Config;
use crate::session::types::NewProfile;
use crate::storage::ProfileStore;

pub async fn run_profile(config: &Config, action: ProfileAction) -> anyhow::Result<()> {
    let (store, _store_task) = open_store(config)?;
    run_profile_with(&store, action).await
}

async fn run_profile_with(store: &dyn ProfileStore, action: ProfileAction) -> anyhow::Result<()> {
    match action {
        ProfileAction::Add {
            provider_id,
            name,
            email,
            image_url,
        } => {
            if provider_id.trim().is_empty() {
                anyhow::bail!("--provider-id cannot be empty");
            }
            let profile = store
                .upsert_profile(NewProfile {
                    provider_id: provider_id.trim().to_string(),
                    name,
                    email,
                    image_url,
                })
                .await?;
            println!("Profile {} ({})", profile.id, profile.provider_id);
        }
        ProfileAction::List { limit } => {
            let profiles = store.list_profiles(limit).await?;
            if profiles.is_empty() {
                println!("No profiles.");
            }
            for p in profiles {
                println!("{}  {:<24} {} <{}>", p.id, p.provider_id, p.name, p.email);
            }
        }
    }
    Ok(())
}
