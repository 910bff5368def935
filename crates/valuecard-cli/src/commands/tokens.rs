use anyhow::{Result, bail};
use valuecard_state::StateLayer;

use crate::output::{print_failure, print_success};

pub async fn revoke(layer: &StateLayer, token: &str, ttl: u64) -> Result<()> {
    if !layer.revocation.blacklist_token(token, ttl).await {
        bail!("failed to revoke token");
    }
    print_success(&format!("Token revoked for {ttl}s"));
    Ok(())
}

pub async fn revoked(layer: &StateLayer, token: &str) -> Result<()> {
    if layer.revocation.is_token_blacklisted(token).await {
        print_failure("Token is revoked");
    } else {
        print_success("Token is not revoked");
    }
    Ok(())
}
