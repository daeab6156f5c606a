use crate::*;

fn fast_pings() -> RelayConfig {
    let mut config = test_config();
    config.liveness.ping_interval_ms = 100;
    config
}

#[tokio::test]
async fn silent_connection_is_terminated() -> Result<()> {
    let relay = start_relay_with(fast_pings()).await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;

    // Not reading means no pongs go back.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(sender.closed().await);
    assert_eq!(relay.status().await?["connected"], 0);
    Ok(())
}

#[tokio::test]
async fn keepalives_are_empty_text_frames() -> Result<()> {
    let relay = start_relay_with(fast_pings()).await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;

    let mut saw_keepalive = false;
    let mut saw_ping = false;
    while !(saw_keepalive && saw_ping) {
        match tokio::time::timeout(STEP, sender.ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => saw_keepalive |= text.is_empty(),
            Ok(Some(Ok(Message::Ping(_)))) => saw_ping = true,
            other => anyhow::bail!("connection ended early: {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn chatty_connection_stays_open() -> Result<()> {
    let relay = start_relay_with(fast_pings()).await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Unknown frame type: ignored, but counts as traffic.
        sender.send_frame(9u64.to_le_bytes().to_vec()).await?;
    }
    assert_eq!(sender.advertise(&[("a.bin", 1)]).await?.len(), 1);
    assert_eq!(relay.status().await?["connected"], 1);
    Ok(())
}
