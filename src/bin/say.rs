//! Command-line synthesis front-end.
//!
//! Loads the model from a local directory or the HuggingFace Hub, speaks one
//! text, and writes a WAV file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use flowtts::{download, Lang, SynthesisOptions, Voice};

#[derive(Parser)]
#[command(name = "say", about = "Text-to-speech synthesis to a WAV file")]
struct Args {
    /// Text to synthesise.
    text: String,

    /// Language tag: en, ko, es, pt, fr.
    #[arg(short, long, default_value = "en")]
    lang: Lang,

    /// Voice: M1-M5, F1-F5.
    #[arg(short, long, default_value = "F1")]
    voice: Voice,

    /// Denoising step budget.
    #[arg(long, default_value_t = 16)]
    steps: usize,

    /// Playback speed factor.
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Silence between chunks, in seconds.
    #[arg(long, default_value_t = 0.3)]
    silence: f32,

    /// Local model directory (tts.json, unicode_indexer.json, *.onnx).
    /// When set, voice styles are read from `<dir>/voice_styles/`.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// HuggingFace repository to download from.
    #[arg(long, default_value = download::DEFAULT_REPO)]
    repo: String,

    /// Output WAV path.
    #[arg(short, long, default_value = "output.wav")]
    out: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (mut tts, style) = match &args.model_dir {
        Some(dir) => {
            let tts = download::load_from_dir(dir)?;
            let style = flowtts::Style::from_json_file(&dir.join(args.voice.style_path()))?;
            (tts, style)
        }
        None => {
            let tts = download::load_from_hub(&args.repo)?;
            let style = download::fetch_voice(&args.repo, args.voice)?;
            (tts, style)
        }
    };
    tts.load_voice(args.voice, style)?;

    let opts = SynthesisOptions {
        total_step: args.steps,
        speed: args.speed,
        silence_duration: args.silence,
    };

    let mut on_progress = |step: usize, total: usize| {
        eprint!("\rdenoising {step}/{total}");
        if step == total {
            eprintln!();
        }
    };
    let audio = tts.synthesize(&args.text, args.lang, &opts, Some(&mut on_progress))?;

    audio.write_wav(&args.out)?;
    println!(
        "Wrote {} ({:.2} s at {} Hz)",
        args.out.display(),
        audio.duration,
        audio.sample_rate
    );
    Ok(())
}
