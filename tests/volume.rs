mod test_utils;
use test_utils::{mock_bridge, TestBus};

use cecbridge::{
    utils::mock_device::MockBus, CecError, Command, EventKind, UserControlCode, VolumeOutcome,
    VolumeTarget,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_volume_far_then_near() -> anyhow::Result<()> {
    let (bridge, bus) = mock_bridge(MockBus::default());

    let outcome = bridge.set_volume(80).await?;
    assert_eq!(
        outcome,
        VolumeOutcome::Converged {
            target: 80,
            level: 80,
            attempts: 4
        }
    );

    let bus = bus.lock().await;
    // A burst of 12 presses covers 30 units, then 3 single presses close the gap
    assert_eq!(bus.volume_presses(), (15, 0));
    assert_eq!(
        bus.count(&Command::UserControlRelease),
        15,
        "every press must be released"
    );
    assert_eq!(bridge.volume().map(|s| s.level), Some(80));
    Ok(())
}

#[tokio::test]
async fn test_volume_down() -> anyhow::Result<()> {
    let (bridge, bus) = mock_bridge(MockBus::default());

    let outcome = bridge.set_volume(20).await?;
    assert!(outcome.is_converged());
    assert_eq!(outcome.level(), 20);
    assert_eq!(bus.lock().await.volume_presses().0, 0);
    Ok(())
}

#[tokio::test]
async fn test_volume_already_there() -> anyhow::Result<()> {
    let (bridge, bus) = mock_bridge(MockBus::default().with_level(41));

    let outcome = bridge.set_volume(40).await?;
    assert_eq!(
        outcome,
        VolumeOutcome::Converged {
            target: 40,
            level: 41,
            attempts: 0
        }
    );
    assert_eq!(bus.lock().await.volume_presses(), (0, 0));
    Ok(())
}

#[tokio::test]
async fn test_volume_out_of_range() {
    let (bridge, bus) = mock_bridge(MockBus::default());

    for target in [150, -1, 101] {
        let err = bridge.set_volume(target).await.unwrap_err();
        assert!(matches!(err, CecError::InvalidTarget(_)), "{:?}", err);
    }
    assert!(bus.lock().await.received.is_empty());
}

#[tokio::test]
async fn test_volume_no_report() {
    let (bridge, _bus) = mock_bridge(MockBus::default().with_silent_audio());

    let err = bridge.set_volume(80).await.unwrap_err();
    assert!(matches!(
        err,
        CecError::Timeout {
            expected: EventKind::AudioStatus
        }
    ));
    assert_eq!(bridge.volume(), None);
}

#[tokio::test]
async fn test_volume_not_converged() -> anyhow::Result<()> {
    // Each press overshoots the target
    let (bridge, bus) = mock_bridge(MockBus::default().with_step_size(10));

    let outcome = bridge.set_volume(55).await?;
    assert_eq!(
        outcome,
        VolumeOutcome::NotConverged {
            target: 55,
            level: 60,
            attempts: 10
        }
    );
    // 10 loop presses plus the final correction
    let (up, down) = bus.lock().await.volume_presses();
    assert_eq!(up + down, 11);
    Ok(())
}

#[tokio::test]
async fn test_volume_lagging_reports() -> anyhow::Result<()> {
    // Reports trail the presses, the burst must settle before the near regime starts
    let (bridge, bus) = mock_bridge(MockBus::default().with_steps_per_report(3));

    let outcome = bridge.set_volume(80).await?;
    assert!(outcome.is_converged());
    assert_eq!(outcome.level(), 80);
    assert_eq!(bus.lock().await.volume_presses(), (15, 0));
    Ok(())
}

#[tokio::test]
async fn test_volume_reports_never_settle() {
    let (bridge, _bus) = mock_bridge(MockBus::default().with_steps_per_report(1));

    let err = bridge.set_volume(80).await.unwrap_err();
    assert!(matches!(
        err,
        CecError::Timeout {
            expected: EventKind::AudioStatus
        }
    ));
}

#[tokio::test]
async fn test_volume_concurrent() -> anyhow::Result<()> {
    let (bridge, bus) = mock_bridge(MockBus::default());

    let (a, b) = tokio::join!(bridge.set_volume(80), bridge.set_volume(30));
    let (a, b) = (a?, b?);
    assert!(a.is_converged(), "{:?}", a);
    assert!(b.is_converged(), "{:?}", b);

    let level = bus.lock().await.level;
    assert!(level == 80 || level == 30, "level {}", level);
    Ok(())
}

#[tokio::test]
async fn test_volume_cancelled() {
    let (bridge, bus) = mock_bridge(MockBus::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = bridge
        .set_volume_target(VolumeTarget::new(80).unwrap(), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CecError::Cancelled));
    assert!(bus.lock().await.received.is_empty());
}

#[tokio::test]
async fn test_volume_frames() -> anyhow::Result<()> {
    let (mut dev, bridge) = TestBus::new(test_utils::test_config());

    let outcome = dev
        .run(
            bridge.set_volume(42),
            &[
                ("tx E5:71", &["5E:7A:28"]),
                ("tx E5:44:41", &[]),
                ("tx E5:45", &[]),
                ("tx E5:71", &["5E:7A:29"]),
                ("tx E5:71", &["5E:7A:29"]),
            ],
        )
        .await?;
    assert_eq!(
        outcome,
        VolumeOutcome::Converged {
            target: 42,
            level: 41,
            attempts: 1
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_mute() -> anyhow::Result<()> {
    use cecbridge::MuteAction;

    let (bridge, bus) = mock_bridge(MockBus::default());
    let mute = Command::UserControlPressed(UserControlCode::Mute);

    // Presses are handled by the bus in order, a status round trip observes them
    bridge.set_mute(MuteAction::On).await?;
    assert!(bridge.refresh_audio_status().await?.muted);
    assert!(bus.lock().await.muted);

    // Already muted, nothing to press
    bridge.set_mute(MuteAction::On).await?;
    assert!(bridge.refresh_audio_status().await?.muted);
    assert_eq!(bus.lock().await.count(&mute), 1);

    bridge.set_mute(MuteAction::Toggle).await?;
    assert!(!bridge.refresh_audio_status().await?.muted);
    assert_eq!(bus.lock().await.count(&mute), 2);

    bridge.set_mute(MuteAction::Off).await?;
    let status = bridge.refresh_audio_status().await?;
    assert_eq!(bus.lock().await.count(&mute), 2);
    assert!(!status.muted);
    assert_eq!(status.level, 50);
    Ok(())
}
