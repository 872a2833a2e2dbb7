use std::collections::HashMap;

use ainshtein::{
    config::DiscoveryPolicy,
    credential::{CredentialStore as _, ImportMethod, MemoryCredentialStore},
    discovery::{BalanceSource, DiscoveryStage},
    errors::WalletError,
    wallet::{ImportOutcome, RecoveryInput, WalletContext},
};
use async_trait::async_trait;

const PHRASE: &str = "have work cattle cream victory just garden pilot lonely fiscal rough winner";
const ACCOUNT0: &str = "Bsw8DaAn7tb7n4AuP1WWVDS4BjEW3EVKnDwobqx8WYFC";
const ACCOUNT1: &str = "B3GyLfJNL8mN4JNh6NNzCSKoYDGPh5cKsZ5sUd1bgCfB";
const DIRECT: &str = "Cz753x7L2a84fTWisCQAzaWN5ovT8n1Wyu3euSf9H8hs";
const ACCOUNT0_HEX: &str = "ca73d95d51518ce8c05e9bf93fac623fd3bfa40bd06d4493f88f484b172930a7a1a11bc0387475c37f47f227e820eccf2416a7e207375adff2a970f7334144eb";

struct FakeLedger(HashMap<&'static str, u64>);

#[async_trait]
impl BalanceSource for FakeLedger {
    async fn get_balance(&self, public_key: &str) -> Result<u64, WalletError> {
        Ok(self.0.get(public_key).copied().unwrap_or(0))
    }
}

fn wallet(funded: &[(&'static str, u64)]) -> WalletContext<MemoryCredentialStore, FakeLedger> {
    WalletContext::new(
        MemoryCredentialStore::new(),
        FakeLedger(funded.iter().copied().collect()),
        DiscoveryPolicy::default(),
    )
}

fn phrase() -> RecoveryInput {
    RecoveryInput::phrase(PHRASE.to_owned(), None)
}

#[tokio::test]
async fn single_funded_account_is_imported_without_asking() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT1, 1_500_000_000)]);
    let ImportOutcome::Imported(acct) = w.import(phrase()).await? else {
        eyre::bail!("expected an automatic import");
    };
    assert_eq!(acct.public_key, ACCOUNT1);
    assert_eq!(acct.path.as_deref(), Some("m/44'/501'/1'/0'"));
    assert_eq!(acct.lamports, 1_500_000_000);

    let history = w.stage_history();
    assert!(!history.contains(&DiscoveryStage::AwaitingUserChoice));
    assert!(history.ends_with(&[
        DiscoveryStage::AutoSelected,
        DiscoveryStage::Completing,
        DiscoveryStage::Terminal
    ]));

    assert!(w.state().imported);
    assert_eq!(w.state().balance_sol(), "1.5");
    let rec = w
        .store()
        .load()
        .await?
        .ok_or_else(|| eyre::eyre!("record missing"))?;
    assert_eq!(rec.public_key, ACCOUNT1);
    assert_eq!(rec.import_method, ImportMethod::SeedPhrase);
    Ok(())
}

#[tokio::test]
async fn nothing_funded_persists_nothing() -> eyre::Result<()> {
    let mut w = wallet(&[]);
    let ImportOutcome::NoneFound { scanned } = w.import(phrase()).await? else {
        eyre::bail!("expected none found");
    };
    // Pinned paths repeat sweep entries, so fewer unique accounts than the search space.
    assert!(scanned > 0 && scanned < w.policy().search_space());
    assert_eq!(w.stage(), DiscoveryStage::NoneFound);
    assert!(w.store().raw().await.is_none());
    assert!(!w.state().imported);
    Ok(())
}

#[tokio::test]
async fn several_funded_accounts_are_offered_richest_first() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 5), (DIRECT, 7), (ACCOUNT1, 900)]);
    let ImportOutcome::AwaitingUserChoice(pending) = w.import(phrase()).await? else {
        eyre::bail!("expected a choice");
    };
    let keys: Vec<String> = pending
        .summaries()
        .into_iter()
        .map(|s| s.public_key)
        .collect();
    assert_eq!(keys, vec![ACCOUNT1, DIRECT, ACCOUNT0]);
    assert_eq!(w.stage(), DiscoveryStage::AwaitingUserChoice);
    assert!(w.store().raw().await.is_none());

    w.cancel_selection(pending);
    assert_eq!(w.stage(), DiscoveryStage::Idle);
    assert!(w.store().raw().await.is_none());
    assert!(!w.state().imported);
    Ok(())
}

#[tokio::test]
async fn chosen_account_is_persisted() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 5), (ACCOUNT1, 900)]);
    let ImportOutcome::AwaitingUserChoice(pending) = w.import(phrase()).await? else {
        eyre::bail!("expected a choice");
    };
    let acct = w.complete_selection(pending, ACCOUNT0).await?;
    assert_eq!(acct.public_key, ACCOUNT0);
    assert_eq!(acct.lamports, 5);
    assert_eq!(w.stage(), DiscoveryStage::Terminal);
    assert_eq!(w.state().public_key.as_deref(), Some(ACCOUNT0));
    Ok(())
}

#[tokio::test]
async fn choice_outside_the_offer_is_rejected() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 5), (ACCOUNT1, 900)]);
    let ImportOutcome::AwaitingUserChoice(pending) = w.import(phrase()).await? else {
        eyre::bail!("expected a choice");
    };
    let res = w.complete_selection(pending, DIRECT).await;
    assert!(matches!(res, Err(WalletError::SelectionNotOffered(pk)) if pk == DIRECT));
    assert!(w.store().raw().await.is_none());
    assert!(!w.state().imported);
    assert_eq!(w.stage(), DiscoveryStage::Idle);
    Ok(())
}

#[tokio::test]
async fn private_key_import_replaces_existing_wallet() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT1, 3), (ACCOUNT0, 11)]);
    let ImportOutcome::AwaitingUserChoice(pending) = w.import(phrase()).await? else {
        eyre::bail!("expected a choice");
    };
    w.complete_selection(pending, ACCOUNT1).await?;

    let ImportOutcome::Imported(acct) = w
        .import(RecoveryInput::private_key(format!("0x{ACCOUNT0_HEX}")))
        .await?
    else {
        eyre::bail!("expected an import");
    };
    assert_eq!(acct.public_key, ACCOUNT0);
    assert_eq!(acct.path, None);
    assert_eq!(acct.lamports, 11);

    let rec = w
        .store()
        .load()
        .await?
        .ok_or_else(|| eyre::eyre!("record missing"))?;
    assert_eq!(rec.public_key, ACCOUNT0);
    assert_eq!(rec.import_method, ImportMethod::PrivateKey);
    assert_eq!(rec.seed_phrase, None);
    Ok(())
}

#[tokio::test]
async fn malformed_private_key_changes_nothing() -> eyre::Result<()> {
    let mut w = wallet(&[]);
    let res = w
        .import(RecoveryInput::private_key("definitely not a key".to_owned()))
        .await;
    assert!(matches!(res, Err(WalletError::InvalidPrivateKeyFormat)));
    assert!(w.store().raw().await.is_none());
    Ok(())
}

#[tokio::test]
async fn clear_removes_the_wallet() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 1)]);
    w.import(phrase()).await?;
    assert!(w.state().imported);

    w.clear().await?;
    assert!(!w.state().imported);
    assert!(w.keypair().is_none());
    assert!(w.store().load().await?.is_none());

    // Idempotent.
    w.clear().await?;
    Ok(())
}

#[tokio::test]
async fn init_restores_a_stored_wallet() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 42)]);
    w.import(phrase()).await?;
    let raw = w
        .store()
        .raw()
        .await
        .ok_or_else(|| eyre::eyre!("record missing"))?;

    let mut restored = WalletContext::new(
        MemoryCredentialStore::with_raw(raw),
        FakeLedger(HashMap::from([(ACCOUNT0, 43)])),
        DiscoveryPolicy::default(),
    );
    restored.init().await;
    assert!(restored.state().imported);
    assert_eq!(restored.state().public_key.as_deref(), Some(ACCOUNT0));
    assert_eq!(restored.state().lamports, 43);
    assert!(restored.keypair().is_some());
    Ok(())
}

#[tokio::test]
async fn init_on_corrupt_record_reports_not_imported() {
    let mut w = WalletContext::new(
        MemoryCredentialStore::with_raw("{\"privateKey\": 7"),
        FakeLedger(HashMap::new()),
        DiscoveryPolicy::default(),
    );
    w.init().await;
    assert!(!w.state().imported);
    assert!(w.keypair().is_none());
    assert_eq!(
        w.state().error.as_ref().map(|e| e.code.as_str()),
        Some("storage_corrupt")
    );
}

#[tokio::test]
async fn requested_account_is_imported_without_asking() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT0, 5), (ACCOUNT1, 900)]);
    let ImportOutcome::Imported(acct) = w.import_account(phrase(), ACCOUNT0).await? else {
        eyre::bail!("expected an import");
    };
    assert_eq!(acct.public_key, ACCOUNT0);
    assert_eq!(w.stage(), DiscoveryStage::Terminal);
    Ok(())
}

#[tokio::test]
async fn requested_account_must_match_the_single_funded_one() -> eyre::Result<()> {
    let mut w = wallet(&[(ACCOUNT1, 900)]);
    let res = w.import_account(phrase(), ACCOUNT0).await;
    assert!(matches!(res, Err(WalletError::SelectionNotOffered(pk)) if pk == ACCOUNT0));
    assert!(w.store().raw().await.is_none());
    assert!(!w.state().imported);
    assert!(!w.stage_history().contains(&DiscoveryStage::Completing));
    Ok(())
}

#[tokio::test]
async fn requested_account_with_nothing_funded_stores_nothing() -> eyre::Result<()> {
    let mut w = wallet(&[]);
    let outcome = w.import_account(phrase(), ACCOUNT0).await?;
    assert!(matches!(outcome, ImportOutcome::NoneFound { .. }));
    assert!(w.store().raw().await.is_none());
    Ok(())
}

#[tokio::test]
async fn requested_account_checks_the_private_key_owner() -> eyre::Result<()> {
    let mut w = wallet(&[]);
    let res = w
        .import_account(RecoveryInput::private_key(ACCOUNT0_HEX.to_owned()), ACCOUNT1)
        .await;
    assert!(matches!(res, Err(WalletError::SelectionNotOffered(_))));
    assert!(w.store().raw().await.is_none());

    let outcome = w
        .import_account(RecoveryInput::private_key(ACCOUNT0_HEX.to_owned()), ACCOUNT0)
        .await?;
    assert!(matches!(outcome, ImportOutcome::Imported(a) if a.public_key == ACCOUNT0));
    Ok(())
}
