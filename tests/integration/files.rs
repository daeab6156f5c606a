use crate::*;

#[tokio::test]
async fn advertised_file_is_downloadable() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;

    let acks = sender.advertise(&[("notes.txt", 11)]).await?;
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].path, "notes.txt");
    assert_eq!(acks[0].size, 11);
    assert_eq!(acks[0].link, format!("{}/notes.txt", identity.code));

    let _serving = sender.serve(one_file("notes.txt", b"hello relay".to_vec()));
    let response = relay.get(&acks[0].link, None).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    assert_eq!(&response.bytes().await?[..], b"hello relay");
    Ok(())
}

#[tokio::test]
async fn nested_paths_are_served() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    sender.init(None).await?;
    let acks = sender.advertise(&[("album/track 01.mp3", 4)]).await?;

    let _serving = sender.serve(one_file("album/track 01.mp3", vec![1, 2, 3, 4]));
    let response = relay.get(&acks[0].link.replace(' ', "%20"), None).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(&response.bytes().await?[..], &[1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn withdrawn_file_is_gone() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    sender.advertise(&[("a.bin", 10)]).await?;

    let acks = sender.withdraw(&["a.bin", "never-advertised"]).await?;
    assert_eq!(acks.len(), 2);
    assert!(acks.iter().all(|a| a.deleted));

    let response = relay.get(&format!("{}/a.bin", identity.code), None).await?;
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await?, "File not found");
    Ok(())
}

#[tokio::test]
async fn unknown_code_or_path_is_404() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    sender.advertise(&[("a.bin", 10)]).await?;

    assert_eq!(relay.get("no-such-code/a.bin", None).await?.status(), 404);
    assert_eq!(
        relay.get(&format!("{}/b.bin", identity.code), None).await?.status(),
        404
    );
    Ok(())
}

#[tokio::test]
async fn readvertising_replaces_metadata() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    sender.advertise(&[("a.bin", 10)]).await?;
    sender.advertise(&[("a.bin", 4)]).await?;

    let _serving = sender.serve(one_file("a.bin", vec![9; 4]));
    let response = relay.get(&format!("{}/a.bin", identity.code), None).await?;
    assert_eq!(response.headers()["content-length"], "4");
    Ok(())
}

/// Download `link` in full and return how many chunk requests it cost.
async fn download(relay: &Relay, link: &str, serving: &Serving) -> Result<(Vec<u8>, usize)> {
    let before = serving.requests();
    let response = relay.get(link, None).await?;
    assert_eq!(response.status(), 200);
    let body = response.bytes().await?.to_vec();
    Ok((body, serving.requests() - before))
}

#[tokio::test]
async fn replaced_file_is_fetched_fresh() -> Result<()> {
    let relay = start_relay().await?;
    let mut sender = Sender::connect(&relay).await?;
    let identity = sender.init(None).await?;
    let acks = sender.advertise(&[("a.bin", 10)]).await?;
    let link = acks[0].link.clone();

    let serving = sender.serve(one_file("a.bin", vec![1; 10]));
    assert_eq!(download(&relay, &link, &serving).await?, (vec![1; 10], 1));
    // Unchanged file: answered from what the relay already holds.
    assert_eq!(download(&relay, &link, &serving).await?, (vec![1; 10], 0));
    drop(serving);

    // Same size, new content, withdrawn and advertised again.
    let mut sender = Sender::connect(&relay).await?;
    sender.init(Some(&identity.session_secret)).await?;
    sender.withdraw(&["a.bin"]).await?;
    sender.advertise(&[("a.bin", 10)]).await?;
    let serving = sender.serve(one_file("a.bin", vec![2; 10]));
    assert_eq!(download(&relay, &link, &serving).await?, (vec![2; 10], 1));
    drop(serving);

    // Grown in place, no withdraw in between.
    let mut sender = Sender::connect(&relay).await?;
    sender.init(Some(&identity.session_secret)).await?;
    sender.advertise(&[("a.bin", 20)]).await?;
    let serving = sender.serve(one_file("a.bin", vec![3; 20]));
    assert_eq!(download(&relay, &link, &serving).await?, (vec![3; 20], 1));
    Ok(())
}
