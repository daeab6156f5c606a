use crate::*;

#[tokio::test]
async fn status_counts_sessions_files_and_pending_chunks() -> Result<()> {
    let relay = Arc::new(start_relay().await?);

    let status = relay.status().await?;
    assert_eq!(status["sessions"], 0);
    assert_eq!(status["pending_chunks"], 0);

    let mut a = Sender::connect(&relay).await?;
    let identity = a.init(None).await?;
    a.advertise(&[("x.bin", 10), ("y.bin", 20)]).await?;

    let mut b = Sender::connect(&relay).await?;
    b.init(None).await?;

    let status = relay.status().await?;
    assert_eq!(status["sessions"], 2);
    assert_eq!(status["connected"], 2);
    assert_eq!(status["files"], 2);

    let link = format!("{}/x.bin", identity.code);
    let pending = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.get(&link, None).await })
    };
    a.next_request().await?;
    assert_eq!(relay.status().await?["pending_chunks"], 1);
    pending.abort();
    Ok(())
}
