use crate::*;

async fn sharing(relay: &Relay, path: &str, content: Vec<u8>) -> Result<(String, Serving)> {
    let mut sender = Sender::connect(relay).await?;
    sender.init(None).await?;
    let acks = sender.advertise(&[(path, content.len() as u64)]).await?;
    Ok((acks[0].link.clone(), sender.serve(one_file(path, content))))
}

#[tokio::test]
async fn range_within_one_chunk_is_206() -> Result<()> {
    let relay = start_relay().await?;
    let content = pattern(1000);
    let (link, _serving) = sharing(&relay, "f.bin", content.clone()).await?;

    let response = relay.get(&link, Some("bytes=500-999")).await?;
    assert_eq!(response.status(), 206);
    let headers = response.headers();
    assert_eq!(headers["content-range"], "bytes 500-999/1000");
    assert_eq!(headers["content-length"], "500");
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(&response.bytes().await?[..], &content[500..]);
    Ok(())
}

#[tokio::test]
async fn open_ended_range_runs_to_end() -> Result<()> {
    let relay = start_relay().await?;
    let content = pattern(1000);
    let (link, _serving) = sharing(&relay, "f.bin", content.clone()).await?;

    let response = relay.get(&link, Some("bytes=990-")).await?;
    assert_eq!(response.status(), 206);
    assert_eq!(response.headers()["content-range"], "bytes 990-999/1000");
    assert_eq!(&response.bytes().await?[..], &content[990..]);
    Ok(())
}

#[tokio::test]
async fn out_of_bounds_range_is_416() -> Result<()> {
    let relay = start_relay().await?;
    let (link, serving) = sharing(&relay, "f.bin", pattern(1000)).await?;

    for range in ["bytes=1200-", "bytes=900-800", "bytes=0-1000", "bytes=oops"] {
        let response = relay.get(&link, Some(range)).await?;
        assert_eq!(response.status(), 416, "{range}");
        assert_eq!(response.headers()["content-range"], "bytes */1000");
        assert!(response.bytes().await?.is_empty());
    }
    assert_eq!(serving.requests(), 0, "nothing may be fetched for a bad range");
    Ok(())
}

#[tokio::test]
async fn full_download_spans_chunks() -> Result<()> {
    let relay = start_relay().await?;
    let size = 2 * CHUNK_SIZE as usize + 123_456;
    let content = pattern(size);
    let (link, serving) = sharing(&relay, "movie.mp4", content.clone()).await?;

    let response = relay.get(&link, None).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-length"], size.to_string());
    assert_eq!(response.headers()["content-type"], "video/mp4");
    let body = response.bytes().await?;
    assert_eq!(body.len(), size);
    assert!(body[..] == content[..]);
    assert_eq!(serving.requests(), 3);
    Ok(())
}

#[tokio::test]
async fn unaligned_range_across_chunks() -> Result<()> {
    let relay = start_relay().await?;
    let size = 5_000_000;
    let content = pattern(size);
    let (link, _serving) = sharing(&relay, "f.bin", content.clone()).await?;

    let response = relay.get(&link, Some("bytes=1500000-4200000")).await?;
    assert_eq!(response.status(), 206);
    let body = response.bytes().await?;
    assert!(body[..] == content[1_500_000..=4_200_000]);
    Ok(())
}

#[tokio::test]
async fn concurrent_receivers_share_chunk_requests() -> Result<()> {
    let relay = start_relay().await?;
    let content = pattern(1000);
    let (link, serving) = sharing(&relay, "f.bin", content.clone()).await?;

    let downloads: Vec<_> = (0..6).map(|_| relay.get(&link, None)).collect();
    for response in futures::future::join_all(downloads).await {
        let response = response?;
        assert_eq!(response.status(), 200);
        assert_eq!(&response.bytes().await?[..], &content[..]);
    }
    assert_eq!(serving.requests(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_file_needs_no_fetch() -> Result<()> {
    let relay = start_relay().await?;
    let (link, serving) = sharing(&relay, "empty.txt", Vec::new()).await?;

    let response = relay.get(&link, None).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-length"], "0");
    assert!(response.bytes().await?.is_empty());
    assert_eq!(serving.requests(), 0);
    Ok(())
}

#[tokio::test]
async fn abandoned_download_stops_fetching() -> Result<()> {
    let relay = start_relay().await?;
    let chunks = 10;
    let content = pattern(chunks * CHUNK_SIZE as usize);
    let (link, serving) = sharing(&relay, "big.bin", content.clone()).await?;

    let mut response = relay.get(&link, None).await?;
    assert_eq!(response.status(), 200);
    let first = response.chunk().await?.context("empty body")?;
    assert!(first[..] == content[..first.len()]);
    drop(response);

    // Only what socket buffers absorbed before the drop was ever fetched,
    // and nothing more is fetched afterwards.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = serving.requests();
    assert!(settled < chunks / 2, "{settled} of {chunks} chunks fetched after cancel");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(serving.requests(), settled);
    Ok(())
}
