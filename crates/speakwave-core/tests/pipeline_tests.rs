//! One payload feeding both live playback and the download artifact

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use speakwave_core::{
    decode_payload, encode_in_background, AudioFormat, DownloadConfig, OfflineOpener,
    PackageError, Packager, PlaybackEngine, SpeakwaveConfig, SpeakwaveResult,
};
use std::sync::Arc;
use tempfile::TempDir;

fn speech_payload(frames: usize) -> String {
    let bytes: Vec<u8> = (0..frames)
        .map(|i| ((i as f32 * 0.05).sin() * 12_000.0) as i16)
        .flat_map(i16::to_le_bytes)
        .collect();
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn test_playback_and_download_share_one_buffer() -> SpeakwaveResult<()> {
    let temp_dir = TempDir::new().expect("Should create temp dir");
    let config = SpeakwaveConfig {
        download: DownloadConfig {
            output_dir: Some(temp_dir.path().to_path_buf()),
            ..DownloadConfig::default()
        },
        ..SpeakwaveConfig::default()
    };

    let buffer = Arc::new(decode_payload(&speech_payload(480))?);
    assert!((buffer.duration().as_secs_f64() - 0.02).abs() < 1e-9);

    let opener = Arc::new(OfflineOpener::new(config.device.clone()));
    let mut engine = PlaybackEngine::with_parameters(opener.clone(), config.playback);
    engine.start(Arc::clone(&buffer)).await?;

    let container = encode_in_background(Arc::clone(&buffer)).await?;
    let (artifact, written) = config.download.export(container)?;

    // At unity parameters the device reproduces the decoded samples
    let rendered = {
        let session = engine.session().expect("Should be playing");
        assert!(Arc::ptr_eq(session.buffer(), &buffer));
        let device = opener.latest().expect("Should have opened a device");
        device.render(buffer.frame_count())
    };
    assert_eq!(rendered.as_slice(), buffer.channel(0).expect("Mono buffer"));

    assert!(artifact.file_name().starts_with("speakwave-"));
    assert!(artifact.file_name().ends_with(".wav"));
    assert_eq!(artifact.mime_type(), AudioFormat::Wav.mime_type());
    let path = written.expect("Should write into output_dir");
    let mut reader = hound::WavReader::open(&path).expect("Should open written WAV");
    assert_eq!(reader.len() as usize, buffer.frame_count());
    assert_eq!(reader.spec().sample_rate, 24_000);
    assert!(reader.samples::<i16>().all(|s| s.is_ok()));

    assert!(engine.poll_completions());
    engine.dispose().await;
    Ok(())
}

#[test]
fn test_mismatched_extension_is_refused() {
    let buffer = decode_payload(&speech_payload(10)).unwrap();
    let container = speakwave_core::encode_wav(&buffer).unwrap();

    let result = Packager::new().package_as(container, "mp3");
    assert_eq!(
        result.unwrap_err(),
        PackageError::ExtensionMismatch {
            requested: "mp3".to_string(),
            actual: "wav".to_string(),
        }
    );
}

