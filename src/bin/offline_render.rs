//! Offline renderer: shades the same scene as the fragment program on the
//! CPU and writes a PNG.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use accretion_disk::raymarch::shade_pixel;
    use accretion_disk::{ControlState, FrameUniforms, LookControls, QualityTier};
    use anyhow::{anyhow, bail, Context, Result};
    use glam::Vec2;
    use image::{ImageBuffer, Rgb};
    use rayon::prelude::*;

    struct RenderParams {
        width: u32,
        height: u32,
        tier: QualityTier,
        look: LookControls,
        look_name: String,
        controls: ControlState,
        time: f32,
        output: Option<String>,
    }

    impl Default for RenderParams {
        fn default() -> Self {
            Self {
                width: 1920,
                height: 1080,
                tier: QualityTier::Ultra,
                look: LookControls::DEFAULT,
                look_name: "default".to_string(),
                controls: ControlState::default(),
                time: 0.0,
                output: None,
            }
        }
    }

    fn print_help() {
        println!("Accretion Disk Offline Renderer");
        println!();
        println!("Usage: offline_render [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -w, --width <WIDTH>      Output width (default: 1920)");
        println!("  -h, --height <HEIGHT>    Output height (default: 1080)");
        println!("      --tier <TIER>        ultra-low|low|medium|high|ultra (default: ultra)");
        println!("      --zoom <ZOOM>        Camera zoom; distance is 11/zoom (default: 1)");
        println!("      --yaw <RAD>          Extra orbit angle (default: 0)");
        println!("      --pitch <RAD>        Camera height offset (default: 0)");
        println!("      --hover <0..1>       Hover intensity (default: 0)");
        println!("      --time <SECONDS>     Scene time (default: 0)");
        println!("      --look <PRESET>      default|mobile|observatory|dramatic (default: default)");
        println!("  -o, --output <FILE>      Output path (default: accretion_disk_<W>x<H>_<TIER>.png)");
    }

    fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
        args.get(i + 1)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("{} expects a value", flag))
    }

    fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T> {
        let raw = value(args, i, flag)?;
        raw.parse()
            .map_err(|_| anyhow!("invalid value '{}' for {}", raw, flag))
    }

    /// `None` when `--help` was requested.
    fn parse_args(args: &[String]) -> Result<Option<RenderParams>> {
        let mut params = RenderParams::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "-w" | "--width" => params.width = number(args, i, flag)?,
                "-h" | "--height" => params.height = number(args, i, flag)?,
                "--tier" => params.tier = value(args, i, flag)?.parse().map_err(|e: String| anyhow!(e))?,
                "--zoom" => params.controls.camera_zoom = number(args, i, flag)?,
                "--yaw" => params.controls.view_yaw = number(args, i, flag)?,
                "--pitch" => params.controls.view_pitch = number(args, i, flag)?,
                "--hover" => params.controls.hover_intensity = number(args, i, flag)?,
                "--time" => params.time = number(args, i, flag)?,
                "--look" => {
                    let name = value(args, i, flag)?;
                    params.look = name.parse().map_err(|e: String| anyhow!(e))?;
                    params.look_name = name.to_ascii_lowercase();
                }
                "-o" | "--output" => params.output = Some(value(args, i, flag)?.to_string()),
                "--help" => return Ok(None),
                other => bail!("unknown option '{}' (see --help)", other),
            }
            i += 2;
        }
        if params.width == 0 || params.height == 0 {
            bail!("width and height must be positive");
        }
        Ok(Some(params))
    }

    fn to_byte(v: f32) -> u8 {
        (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
    }

    pub fn main() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let args: Vec<String> = std::env::args().collect();
        let Some(params) = parse_args(&args)? else {
            print_help();
            return Ok(());
        };

        let settings = params.tier.settings();
        let frame = FrameUniforms::new(
            params.time,
            [params.width as f32, params.height as f32],
            params.controls,
        );

        println!("Accretion Disk Offline Renderer");
        println!("===============================");
        println!("Resolution: {}x{}", params.width, params.height);
        println!("Tier: {} ({} steps)", params.tier, settings.max_steps);
        println!("Look: {}", params.look_name);
        println!(
            "Camera: zoom {:.2}, yaw {:.3}, pitch {:.3}, hover {:.2}, t = {:.2}s",
            frame.controls.camera_zoom,
            frame.controls.view_yaw,
            frame.controls.view_pitch,
            frame.controls.hover_intensity,
            frame.time
        );
        println!();

        let height = params.height;
        let width = params.width;
        let done = AtomicUsize::new(0);
        let start = Instant::now();
        log::info!("rendering {} rows on {} threads", height, rayon::current_num_threads());

        let rows: Vec<Vec<u8>> = (0..height)
            .into_par_iter()
            .map(|row| {
                // fragment coordinates count rows from the bottom
                let frag_y = (height - 1 - row) as f32 + 0.5;
                let mut line = Vec::with_capacity(width as usize * 3);
                for x in 0..width {
                    let frag = Vec2::new(x as f32 + 0.5, frag_y);
                    let c = shade_pixel(frag, &frame, &settings, &params.look);
                    line.extend_from_slice(&[to_byte(c.x), to_byte(c.y), to_byte(c.z)]);
                }
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % 32 == 0 {
                    eprint!("\rProgress: {}%  ", finished * 100 / height as usize);
                }
                line
            })
            .collect();
        eprintln!("\rProgress: 100%  ");

        let pixels: Vec<u8> = rows.into_iter().flatten().collect();
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, pixels)
            .context("pixel buffer does not match the image size")?;
        println!("Render time: {:.1}s", start.elapsed().as_secs_f32());

        let filename = params.output.clone().unwrap_or_else(|| {
            format!("accretion_disk_{}x{}_{}.png", width, height, params.tier)
        });
        img.save(&filename)
            .with_context(|| format!("failed to save {}", filename))?;
        println!("Saved to: {}", filename);
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn args(list: &[&str]) -> Vec<String> {
            std::iter::once("offline_render")
                .chain(list.iter().copied())
                .map(String::from)
                .collect()
        }

        #[test]
        fn parses_scene_flags() {
            let p = parse_args(&args(&[
                "-w", "320", "--height", "200", "--tier", "low", "--zoom", "2.5", "--hover", "0.4",
                "--look", "Dramatic", "-o", "out.png",
            ]))
            .unwrap()
            .unwrap();
            assert_eq!((p.width, p.height), (320, 200));
            assert_eq!(p.tier, QualityTier::Low);
            assert_eq!(p.controls.camera_zoom, 2.5);
            assert_eq!(p.controls.hover_intensity, 0.4);
            assert_eq!(p.look, LookControls::DRAMATIC);
            assert_eq!(p.look_name, "dramatic");
            assert_eq!(p.output.as_deref(), Some("out.png"));
        }

        #[test]
        fn help_short_circuits() {
            assert!(parse_args(&args(&["--tier", "high", "--help"])).unwrap().is_none());
        }

        #[test]
        fn rejects_bad_input() {
            assert!(parse_args(&args(&["--tier", "extreme"])).is_err());
            assert!(parse_args(&args(&["--zoom"])).is_err());
            assert!(parse_args(&args(&["--width", "wide"])).is_err());
            assert!(parse_args(&args(&["--width", "0"])).is_err());
            assert!(parse_args(&args(&["--fov", "60"])).is_err());
        }

        #[test]
        fn bytes_round_to_nearest() {
            assert_eq!(to_byte(0.0), 0);
            assert_eq!(to_byte(1.0), 255);
            assert_eq!(to_byte(2.0), 255);
            assert_eq!(to_byte(0.5), 128);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
