use crate::*;

#[tokio::test]
async fn init_without_secret_mints_identity() -> Result<()> {
    let relay = start_relay().await?;
    let mut a = Sender::connect(&relay).await?;
    let mut b = Sender::connect(&relay).await?;

    let first = a.init(None).await?;
    let second = b.init(Some("")).await?;

    assert_eq!(first.session_secret.len(), 21);
    assert_eq!(first.code.len(), 21);
    assert_ne!(first.session_secret, second.session_secret);
    assert_ne!(first.code, second.code);
    assert_eq!(relay.directory.len(), 2);
    Ok(())
}

#[tokio::test]
async fn known_secret_resumes_and_supersedes() -> Result<()> {
    let relay = start_relay().await?;
    let mut first = Sender::connect(&relay).await?;
    let identity = first.init(None).await?;

    let mut second = Sender::connect(&relay).await?;
    let resumed = second.init(Some(&identity.session_secret)).await?;
    assert_eq!(resumed, identity);

    // The older connection is pushed out.
    assert!(first.closed().await);

    // The newer one keeps working.
    let acks = second.advertise(&[("a.txt", 3)]).await?;
    assert_eq!(acks[0].link, format!("{}/a.txt", identity.code));
    Ok(())
}

#[tokio::test]
async fn unknown_secret_gets_fresh_identity() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(Some("not-a-secret-we-issued")).await?;
    assert_ne!(identity.session_secret, "not-a-secret-we-issued");
    Ok(())
}

#[tokio::test]
async fn repeated_init_repeats_identity() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let first = sender.init(None).await?;
    let again = sender.init(None).await?;
    assert_eq!(first, again);
    assert_eq!(relay.directory.len(), 1);
    Ok(())
}

#[tokio::test]
async fn non_string_secret_terminates_connection() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender
        .send_frame(wire::encode(MessageType::Init, br#"{"sessionSecret":42}"#))
        .await?;
    assert!(sender.closed().await);
    assert_eq!(relay.directory.len(), 0);
    Ok(())
}

#[tokio::test]
async fn oversized_init_terminates_connection() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender
        .send_frame(wire::encode(MessageType::Init, &vec![b' '; 1_000_001]))
        .await?;
    assert!(sender.closed().await);
    Ok(())
}

#[tokio::test]
async fn frames_before_init_terminate_connection() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender
        .send_frame(wire::encode_json(MessageType::FilesWithdraw, &["a"])?)
        .await?;
    assert!(sender.closed().await);
    Ok(())
}
