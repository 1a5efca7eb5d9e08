//! Asset issuance.

use tracing::info;

use super::local_address;
use crate::context::MintContext;
use crate::error::MintError;
use crate::storage::LedgerRead;
use crate::types::{Asset, AssetName, new_id, parse_code, parse_scale};

/// Creates the asset `owner[CODE.SCALE]`. Assets are immutable and can be
/// created only once.
pub fn create_asset(ctx: &MintContext, owner: &str, code: &str, scale: &str) -> Result<Asset, MintError> {
    let owner = local_address(ctx, owner)?.normalized();
    let code = parse_code(code)?;
    let scale = parse_scale(scale)?;
    let name = AssetName {
        issuer: owner.clone(),
        code: code.clone(),
        scale,
    }
    .to_string();

    let asset = Asset {
        id: new_id(&owner, "asset"),
        created: ctx.now_ms(),
        owner,
        name,
        code,
        scale,
    };

    ctx.store.atomically(|txn| {
        if txn.asset(&asset.name)?.is_some() {
            return Err(MintError::invalid(
                "asset_already_exists",
                format!("asset {} already exists", asset.name),
            ));
        }
        txn.put_asset(&asset)?;
        Ok(())
    })?;

    info!(asset = %asset.name, "asset created");
    Ok(asset)
}

pub fn retrieve_asset(ctx: &MintContext, name: &str) -> Result<Asset, MintError> {
    ctx.store
        .asset(name)?
        .ok_or_else(|| MintError::not_found("asset_not_found", format!("asset {name} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LoopbackNetwork;

    #[test]
    fn create_and_retrieve_asset() {
        let net = LoopbackNetwork::new();
        let ctx = net.add_mint("m0.example.com");

        let asset = create_asset(&ctx, "kurt@m0.example.com", "USD", "2").unwrap();
        assert_eq!(asset.name, "kurt@m0.example.com[USD.2]");
        assert_eq!(asset.scale, 2);

        let fetched = retrieve_asset(&ctx, "kurt@m0.example.com[USD.2]").unwrap();
        assert_eq!(fetched, asset);
    }

    #[test]
    fn duplicate_asset_is_rejected() {
        let net = LoopbackNetwork::new();
        let ctx = net.add_mint("m0.example.com");
        create_asset(&ctx, "kurt@m0.example.com", "USD", "2").unwrap();
        let err = create_asset(&ctx, "kurt@m0.example.com", "USD", "2").unwrap_err();
        assert_eq!(err.code(), "asset_already_exists");
        assert_eq!(err.status(), 400);

        // A different scale is a different asset.
        assert!(create_asset(&ctx, "kurt@m0.example.com", "USD", "4").is_ok());
    }

    #[test]
    fn invalid_code_and_scale_are_rejected() {
        let net = LoopbackNetwork::new();
        let ctx = net.add_mint("m0.example.com");
        assert_eq!(
            create_asset(&ctx, "kurt@m0.example.com", "usd", "2")
                .unwrap_err()
                .code(),
            "code_invalid"
        );
        assert_eq!(
            create_asset(&ctx, "kurt@m0.example.com", "USD", "221323132122")
                .unwrap_err()
                .code(),
            "scale_invalid"
        );
        assert_eq!(
            retrieve_asset(&ctx, "kurt@m0.example.com[EUR.2]")
                .unwrap_err()
                .code(),
            "asset_not_found"
        );
    }
}
