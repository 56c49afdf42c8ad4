// Renders every effect and music loop to WAV, or auditions one on the
// default output device.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use quiztone::{
    AudioConfig, AudioError, Effect, EffectBank, MusicComposer, PlaybackController, SessionState, Track,
};

#[derive(Parser)]
#[command(name = "quiztone-render")]
#[command(about = "Render the quiz sound catalogue to WAV, or audition one sound")]
#[command(version)]
struct Cli {
    /// Directory for the rendered WAV files
    #[arg(default_value = "renders")]
    out_dir: PathBuf,

    /// Sample rate for offline renders
    #[arg(long, default_value_t = 44100, value_parser = clap::value_parser!(u32).range(1..))]
    rate: u32,

    /// Seed for the noise layers
    #[arg(long)]
    seed: Option<u64>,

    /// Play one effect or track on the default device instead of rendering
    #[arg(long)]
    play: Option<String>,

    /// How long to audition for
    #[arg(long, default_value = "8", value_parser = parse_seconds)]
    seconds: Duration,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f32 = s.parse().map_err(|_| format!("`{}` is not a number", s))?;
    Duration::try_from_secs_f32(secs).map_err(|_| format!("`{}` must be a finite, non-negative number of seconds", s))
}

enum Sound {
    Effect(Effect),
    Track(Track),
}

impl Sound {
    fn resolve(name: &str) -> Result<Self, AudioError> {
        if let Ok(track) = name.parse::<Track>() {
            return Ok(Sound::Track(track));
        }
        name.parse::<Effect>().map(Sound::Effect)
    }
}

fn render_all(cli: &Cli) -> Result<(), AudioError> {
    std::fs::create_dir_all(&cli.out_dir)?;

    let mut bank = EffectBank::with_seed(cli.rate, cli.seed);
    for effect in Effect::ALL {
        let path = cli.out_dir.join(format!("{}.wav", effect));
        bank.effect(effect)?.write_wav(&path)?;
        info!("Wrote {}", path.display());
    }

    let mut composer = MusicComposer::with_seed(cli.rate, cli.seed);
    for track in Track::ALL {
        let path = cli.out_dir.join(format!("{}.wav", track));
        let buffer = composer.track(track)?;
        buffer.write_wav(&path)?;
        info!("Wrote {} ({:.1}s, peak {:.3})", path.display(), buffer.duration(), buffer.peak());
    }
    Ok(())
}

fn audition(controller: &mut PlaybackController, name: &str, seconds: Duration) -> Result<(), AudioError> {
    let sound = Sound::resolve(name)?;

    let state = controller.init()?;
    if state != SessionState::Ready {
        return Err(AudioError::ResumeDenied(format!("device is {:?}", state)));
    }

    let started = match sound {
        Sound::Track(track) => controller.play_track(track),
        Sound::Effect(effect) => controller.play(effect),
    };
    if started.is_none() {
        return Err(AudioError::ResumeDenied(format!("device is {:?}", controller.session_state())));
    }

    std::thread::sleep(seconds);
    controller.stop_music();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match &cli.play {
        Some(name) => {
            let mut config = AudioConfig::default();
            if let Some(seed) = cli.seed {
                config = config.with_noise_seed(seed);
            }
            let mut controller = PlaybackController::with_default_device(config);
            audition(&mut controller, name, cli.seconds)
        }
        None => render_all(&cli),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiztone::OfflineBackend;

    fn offline(backend: OfflineBackend) -> PlaybackController {
        PlaybackController::new(AudioConfig::default(), Box::new(backend))
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::try_parse_from(["quiztone-render"]).unwrap();
        assert_eq!(cli.out_dir, PathBuf::from("renders"));
        assert_eq!(cli.rate, 44100);
        assert_eq!(cli.seed, None);
        assert!(cli.play.is_none());
        assert_eq!(cli.seconds, Duration::from_secs(8));
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "quiztone-render", "out", "--rate", "48000", "--seed", "7", "--play", "menu", "--seconds", "1.5",
        ])
        .unwrap();
        assert_eq!(cli.out_dir, PathBuf::from("out"));
        assert_eq!(cli.rate, 48000);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.play.as_deref(), Some("menu"));
        assert_eq!(cli.seconds, Duration::from_millis(1500));
    }

    #[test]
    fn bad_seconds_are_rejected() {
        for bad in ["--seconds=-1", "--seconds=nan", "--seconds=inf", "--seconds=1e30", "--seconds=soon"] {
            assert!(Cli::try_parse_from(["quiztone-render", bad]).is_err(), "{} accepted", bad);
        }
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert_eq!(parse_seconds("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(Cli::try_parse_from(["quiztone-render", "--rate", "0"]).is_err());
    }

    #[test]
    fn unknown_sound_is_reported_before_touching_the_device() {
        let backend = OfflineBackend::new(8000);
        let mut controller = offline(backend);
        let err = audition(&mut controller, "fanfare", Duration::ZERO).unwrap_err();
        assert!(matches!(err, AudioError::UnknownEffect(ref name) if name == "fanfare"));
        assert_eq!(controller.session_state(), SessionState::Uninitialized);
    }

    #[test]
    fn suspended_device_is_not_an_unknown_effect() {
        let mut controller = offline(OfflineBackend::new(8000).denying_resume(1));
        let err = audition(&mut controller, "click", Duration::ZERO).unwrap_err();
        assert!(matches!(err, AudioError::ResumeDenied(_)));
    }

    #[test]
    fn known_sounds_play_on_a_ready_device() {
        let mut controller = offline(OfflineBackend::new(8000));
        audition(&mut controller, "correct", Duration::ZERO).unwrap();
        audition(&mut controller, "gameplay", Duration::ZERO).unwrap();
        assert_eq!(controller.session_state(), SessionState::Ready);
        assert!(controller.music_handle().is_none());
    }
}
