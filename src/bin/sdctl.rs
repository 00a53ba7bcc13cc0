use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use sdapi_client::utils::overrides::apply_set_pairs;
use sdapi_client::utils::payload::to_payload_object;
use sdapi_client::{ClientConfig, GenerationParams, SdClient};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sdctl", about = "CLI for the Stable Diffusion API", version)]
struct Cli {
    /// Override SD_API_URL
    #[arg(global = true, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate images from a text prompt
    Txt2img {
        #[command(flatten)]
        gen: GenArgs,
        /// Validate and select a checkpoint before generating
        #[arg(long, value_name = "TITLE")]
        select_model: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Generate images from an input image
    Img2img {
        /// Input image file
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        #[command(flatten)]
        gen: GenArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Repaint the masked regions of an input image
    Inpaint {
        /// Input image file
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        /// Mask image file (white = repaint)
        #[arg(long, value_name = "PATH")]
        mask: PathBuf,
        #[command(flatten)]
        gen: GenArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Model checkpoint utilities
    Models {
        #[command(subcommand)]
        cmd: ModelsCmd,
    },
    /// List sampler names
    Samplers {
        /// Output raw JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// List upscaler names
    Upscalers {
        /// Output raw JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// Show current generation progress
    Progress,
    /// Read or change server options
    Options {
        #[command(subcommand)]
        cmd: OptionsCmd,
    },
    /// Asynchronous txt2img tasks
    Task {
        #[command(subcommand)]
        cmd: TaskCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsCmd {
    /// List available checkpoints
    List {
        /// Output raw JSON instead of one title per line
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum OptionsCmd {
    /// Print the server options as JSON
    Get {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Update options, e.g. `sd_model_checkpoint=v1-5-pruned-emaonly.safetensors`
    Set {
        #[arg(value_name = "KEY=VALUE", required = true)]
        pairs: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCmd {
    /// Submit a txt2img job and print its task id
    Submit {
        #[command(flatten)]
        gen: GenArgs,
    },
    /// Fetch the images of a submitted task
    #[command(name = "result")]
    Fetch {
        task_id: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct GenArgs {
    /// Positive prompt text
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,
    /// Negative prompt text
    #[arg(long, value_name = "TEXT")]
    negative_prompt: Option<String>,
    /// Steps
    #[arg(long)]
    steps: Option<u32>,
    /// Sampler name
    #[arg(long)]
    sampler: Option<String>,
    /// CFG scale
    #[arg(long)]
    cfg_scale: Option<f64>,
    /// Width
    #[arg(long)]
    width: Option<u32>,
    /// Height
    #[arg(long)]
    height: Option<u32>,
    /// Seed (-1 for random)
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i64>,
    /// Batch size
    #[arg(long)]
    batch_size: Option<u32>,
    /// Denoising strength (img2img / inpaint)
    #[arg(long)]
    denoising_strength: Option<f64>,
    /// Checkpoint title for this request only
    #[arg(long, value_name = "TITLE")]
    model: Option<String>,
    /// Extra parameters as key=value (repeatable). Dotted keys nest,
    /// e.g. `override_settings.CLIP_stop_at_last_layers=2`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write decoded images into this directory instead of printing base64
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl GenArgs {
    fn into_payload(self) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
        let params = GenerationParams {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            steps: self.steps,
            sampler_name: self.sampler,
            cfg_scale: self.cfg_scale,
            width: self.width,
            height: self.height,
            seed: self.seed,
            batch_size: self.batch_size,
            denoising_strength: self.denoising_strength,
            sd_model_checkpoint: self.model,
            ..Default::default()
        };
        let mut payload = to_payload_object(&params)?;
        apply_set_pairs(&mut payload, &self.sets)?;
        Ok(payload)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load env and parse CLI
    ClientConfig::dotenv_load();
    let cli = Cli::parse();

    let mut conf = ClientConfig::from_env()?;
    if let Some(url) = cli.url {
        conf.base_url = url;
    }
    let mut client = SdClient::from_config(&conf)?;

    match cli.command {
        Commands::Txt2img { gen, select_model, output } => {
            if let Some(title) = select_model {
                client.select_model(&title).await?;
            }
            let payload = gen.into_payload()?;
            let images = client.txt2img(&payload).await?;
            emit_images(images, output.out.as_deref()).await
        }
        Commands::Img2img { image, gen, output } => {
            let init = read_image_base64(&image).await?;
            let payload = gen.into_payload()?;
            let images = client.img2img(&payload, &init).await?;
            emit_images(images, output.out.as_deref()).await
        }
        Commands::Inpaint { image, mask, gen, output } => {
            let init = read_image_base64(&image).await?;
            let mask = read_image_base64(&mask).await?;
            let payload = gen.into_payload()?;
            let images = client.inpaint(&payload, &init, &mask).await?;
            emit_images(images, output.out.as_deref()).await
        }
        Commands::Models { cmd } => match cmd {
            ModelsCmd::List { json } => {
                let models = client.models().await?;
                if json {
                    println!("{}", serde_json::to_string(&models)?);
                } else {
                    for m in &models { println!("{}", m.title); }
                }
                Ok(())
            }
        },
        Commands::Samplers { json } => {
            let samplers = client.samplers().await?;
            if json {
                println!("{}", serde_json::to_string(&samplers)?);
            } else {
                for s in &samplers { println!("{}", s.name); }
            }
            Ok(())
        }
        Commands::Upscalers { json } => {
            let upscalers = client.upscalers().await?;
            if json {
                println!("{}", serde_json::to_string(&upscalers)?);
            } else {
                for u in &upscalers { println!("{}", u.name); }
            }
            Ok(())
        }
        Commands::Progress => {
            match client.progress().await? {
                Some(p) => println!("{}", serde_json::to_string_pretty(&p)?),
                None => eprintln!("Server returned no progress"),
            }
            Ok(())
        }
        Commands::Options { cmd } => match cmd {
            OptionsCmd::Get { pretty } => {
                match client.options().await? {
                    Some(v) if pretty => println!("{}", serde_json::to_string_pretty(&v)?),
                    Some(v) => println!("{}", serde_json::to_string(&v)?),
                    None => eprintln!("Server returned no options"),
                }
                Ok(())
            }
            OptionsCmd::Set { pairs } => {
                let mut options = Map::new();
                apply_set_pairs(&mut options, &pairs)?;
                if !client.set_options(&options).await? {
                    return Err("server rejected the options update".into());
                }
                println!("Options updated");
                Ok(())
            }
        },
        Commands::Task { cmd } => match cmd {
            TaskCmd::Submit { gen } => {
                let payload = gen.into_payload()?;
                let id = client
                    .submit_txt2img_async(&payload)
                    .await?
                    .ok_or("server response had no task_id")?;
                println!("{}", id);
                Ok(())
            }
            TaskCmd::Fetch { task_id, output } => {
                let images = client.task_result(&task_id).await?;
                emit_images(images, output.out.as_deref()).await
            }
        },
    }
}

async fn read_image_base64(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

async fn emit_images(images: Option<Vec<String>>, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let images = images.ok_or("no images in response")?;
    let Some(dir) = out else {
        println!("{}", serde_json::to_string(&images)?);
        return Ok(());
    };
    for (path, len) in write_images(&images, dir).await? {
        println!("Saved {} ({} bytes)", path.display(), len);
    }
    Ok(())
}

/// Decode each image into `dir/<n>.png`, returning the paths and byte counts.
async fn write_images(images: &[String], dir: &Path) -> Result<Vec<(PathBuf, usize)>, Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::with_capacity(images.len());
    for (i, encoded) in images.iter().enumerate() {
        // Some servers prefix a data URL header.
        let raw = encoded.rsplit_once(',').map(|(_, b)| b).unwrap_or(encoded.as_str());
        let bytes = STANDARD.decode(raw)?;
        let path = dir.join(format!("{}.png", i));
        tokio::fs::write(&path, &bytes).await?;
        written.push((path, bytes.len()));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_images_is_an_error() {
        let err = emit_images(None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "no images in response");
    }

    #[tokio::test]
    async fn test_write_images_names_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec!["QUFB".to_string(), "data:image/png;base64,QkJCQg==".to_string()];

        let written = write_images(&images, dir.path()).await.unwrap();
        assert_eq!(written, vec![(dir.path().join("0.png"), 3), (dir.path().join("1.png"), 4)]);
        assert_eq!(std::fs::read(dir.path().join("0.png")).unwrap(), b"AAA");
        assert_eq!(std::fs::read(dir.path().join("1.png")).unwrap(), b"BBBB");
    }

    #[tokio::test]
    async fn test_bad_base64_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_images(&["not base64!".to_string()], dir.path()).await.is_err());
    }
}
