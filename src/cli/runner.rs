use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use etpro::core::anchor::{AnchorProvider, AnchorRequest, AutoAnchors};
use etpro::core::params::parse_scalar;
use etpro::types::AnchorKind;
use etpro::{RunParams, SebalInputs, run_sebal};

use super::args::CliArgs;
use super::errors::AppError;

/// Where one anchor coordinate comes from.
#[derive(Debug, Clone, PartialEq)]
enum AnchorSource {
    Fixed(String),
    Auto,
    Prompt,
}

impl AnchorSource {
    fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            None => AnchorSource::Prompt,
            Some(s) if s.eq_ignore_ascii_case("auto") => AnchorSource::Auto,
            Some(s) => AnchorSource::Fixed(s.to_string()),
        }
    }
}

struct CliAnchors {
    cold: AnchorSource,
    hot: AnchorSource,
}

/// Ask for "easting, northing" on `out`, read one line from `input`.
/// An empty line or end of input declines.
fn prompt_anchor<R: BufRead, W: Write>(
    req: &AnchorRequest<'_>,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<String>> {
    let candidates = req.candidates.iter().filter(|v| v.is_finite()).count();
    writeln!(
        out,
        "{} candidate pixels for the {} anchor ({} file written).",
        candidates,
        req.kind,
        match req.kind {
            AnchorKind::Cold => "Pcold.tif",
            AnchorKind::Hot => "Phot.tif",
        }
    )?;
    write!(
        out,
        "Enter {} pixel coordinates (easting, northing), empty to cancel: ",
        req.kind
    )?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    Ok(if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    })
}

impl AnchorProvider for CliAnchors {
    fn request(&mut self, req: &AnchorRequest<'_>) -> etpro::Result<Option<String>> {
        let source = match req.kind {
            AnchorKind::Cold => &self.cold,
            AnchorKind::Hot => &self.hot,
        };
        match source {
            AnchorSource::Fixed(s) => Ok(Some(s.clone())),
            AnchorSource::Auto => {
                let picked = AutoAnchors.request(req)?;
                if let Some(p) = &picked {
                    info!("Automatic {} pixel: {}", req.kind, p);
                }
                Ok(picked)
            }
            AnchorSource::Prompt => {
                let stdin = io::stdin();
                let mut input = stdin.lock();
                Ok(prompt_anchor(req, &mut input, &mut io::stdout())?)
            }
        }
    }
}

fn load_params(config: Option<&Path>) -> Result<RunParams, AppError> {
    let Some(path) = config else {
        return Ok(RunParams::default());
    };
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| AppError::InvalidConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Command line scalars override the config file; a scalar set in neither is an error.
fn merge_params(args: &CliArgs) -> Result<RunParams, AppError> {
    let mut params = load_params(args.config.as_deref())?;
    let scalars: [(&'static str, &Option<String>, &mut f64); 3] = [
        ("u2m", &args.u2m, &mut params.u_2m),
        ("etoi", &args.etoi, &mut params.eto_i),
        ("eto", &args.eto, &mut params.eto),
    ];
    for (arg, text, slot) in scalars {
        match text {
            Some(t) => *slot = parse_scalar(arg, t)?,
            None if slot.is_nan() => {
                return Err(AppError::MissingArgument {
                    arg: format!("--{}", arg),
                });
            }
            None => {}
        }
    }
    params.write_bands |= args.write_bands;
    params.validate()?;
    Ok(params)
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let params = merge_params(&args)?;
    let inputs = SebalInputs {
        mtl: args.mtl.clone(),
        dem: args.dem.clone(),
        bands_dir: args.bands.clone(),
        boundary: args.boundary.clone(),
        output_dir: args.output_dir.clone(),
        reference: args.reference.clone(),
    };
    let mut anchors = CliAnchors {
        cold: AnchorSource::from_arg(args.cold.as_deref()),
        hot: AnchorSource::from_arg(args.hot.as_deref()),
    };

    info!("Starting SEBAL run, output directory: {:?}", inputs.output_dir);
    match run_sebal(&inputs, &params, &mut anchors) {
        Ok(report) => {
            if let Some(cal) = &report.calibration {
                info!(
                    "Calibration {} after {} iteration(s): a={:.6}, b={:.6}",
                    cal.status, cal.iterations, cal.a, cal.b
                );
            }
            info!(
                "Done: {} products written, {} write failures",
                report.products_written.len(),
                report.write_failures.len()
            );
            for failure in &report.write_failures {
                warn!("Not written: {} ({})", failure.product, failure.reason);
            }
            Ok(())
        }
        Err(e) if e.is_cancellation() => {
            warn!("{}. Products already written remain in {:?}", e, inputs.output_dir);
            Ok(())
        }
        Err(e) => Err(AppError::from(e).into()),
    }
}
