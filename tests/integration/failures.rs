use crate::*;

#[tokio::test]
async fn stale_data_reply_is_ignored() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;

    sender
        .send_frame(wire::encode_data(999, b"nobody asked"))
        .await?;

    // Connection is still up and serving.
    let acks = sender.advertise(&[("a.bin", 1)]).await?;
    assert_eq!(acks.len(), 1);
    assert_eq!(relay.status().await?["pending_chunks"], 0);
    Ok(())
}

#[tokio::test]
async fn unknown_frame_type_is_ignored() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;

    sender.send_frame(9u64.to_le_bytes().to_vec()).await?;
    assert_eq!(sender.advertise(&[("a.bin", 1)]).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn silent_sender_yields_500() -> Result<()> {
    let mut config = test_config();
    config.relay.fetch_timeout_secs = 1;
    let relay = start_relay_with(config).await?;

    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    sender.advertise(&[("a.bin", 100)]).await?;

    let response = relay.get(&format!("{}/a.bin", identity.code), None).await?;
    assert_eq!(response.status(), 500);
    Ok(())
}

#[tokio::test]
async fn short_chunk_yields_500() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    sender.advertise(&[("a.bin", 100)]).await?;

    let link = format!("{}/a.bin", identity.code);
    let download =
        tokio::spawn(async move { anyhow::Ok(relay.get(&link, None).await?.status()) });

    let request = sender.next_request().await?;
    sender
        .send_frame(wire::encode_data(request.chunk_id, b"too short"))
        .await?;
    assert_eq!(download.await??, 500);
    Ok(())
}

#[tokio::test]
async fn reconnect_replays_unanswered_requests() -> Result<()> {
    let relay = Arc::new(start_relay().await?);
    let content = pattern(1000);

    let mut first = Sender::connect(&relay).await?;
    let identity = first.init(None).await?;
    first.advertise(&[("a.bin", 1000)]).await?;

    let link = format!("{}/a.bin", identity.code);
    let download = {
        let relay = relay.clone();
        tokio::spawn(async move {
            let response = relay.get(&link, None).await?;
            anyhow::Ok((response.status(), response.bytes().await?))
        })
    };

    // The first connection is asked but never answers.
    let unanswered = first.next_request().await?;
    assert_eq!(unanswered.chunk_index, 0);
    drop(first);

    let mut second = Sender::connect(&relay).await?;
    let resumed = second.init(Some(&identity.session_secret)).await?;
    assert_eq!(resumed.code, identity.code);
    let _serving = second.serve(one_file("a.bin", content.clone()));

    let (status, body) = download.await??;
    assert_eq!(status, 200);
    assert_eq!(&body[..], &content[..]);
    Ok(())
}
