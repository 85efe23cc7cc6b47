use std::{error::Error, fs, path::Path};

use clap::Parser;
use iris_core::RigConfig;
use iris_rig::{RigInput, RigReport, run_eye_rig};

/// Eye joint rig builder.
#[derive(Debug, Parser)]
#[command(author, version, about = "Build an eye iris joint rig from guide positions")]
struct Args {
    /// Path to JSON file containing RigInput.
    #[arg(long)]
    input: String,

    /// Optional path to JSON RigConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Control value to evaluate at; overrides the input file.
    #[arg(long, allow_hyphen_values = true)]
    iris_scale: Option<f64>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

fn write_report_json(report: &RigReport) -> Result<String, Box<dyn Error>> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn run_eye_rig_from_files(
    input_path: &str,
    config_path: Option<&str>,
    iris_scale: Option<f64>,
) -> Result<String, Box<dyn Error>> {
    let mut input: RigInput = load_json_file(Path::new(input_path))?;
    if iris_scale.is_some() {
        input.iris_scale = iris_scale;
    }

    let config = if let Some(cfg_path) = config_path {
        load_json_file::<RigConfig>(Path::new(cfg_path))?
    } else {
        RigConfig::default()
    };

    let report = run_eye_rig(&input, &config).map_err(|e| format!("{e:#}"))?;
    write_report_json(&report)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let json = run_eye_rig_from_files(&args.input, args.config.as_deref(), args.iris_scale)?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::{CosineDomainPolicy, GuideNames, Pt3, StaticPositions};
    use std::{fs, path::Path};
    use tempfile::NamedTempFile;

    fn write_json<T: serde::Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn rig_input(pupil: f64) -> RigInput {
        RigInput {
            guides: GuideNames::new("eye", "iris", "pupil"),
            positions: StaticPositions::new()
                .with("eye", Pt3::new(0.0, 0.0, 0.0))
                .with("iris", Pt3::new(0.0, 0.0, 1.0))
                .with("pupil", Pt3::new(0.0, 0.0, pupil)),
            joint_count: 4,
            iris_scale: Some(0.5),
        }
    }

    #[test]
    fn helper_smoke_test() {
        let input_file = NamedTempFile::new().unwrap();
        write_json(&rig_input(0.5), input_file.path());

        let json = run_eye_rig_from_files(input_file.path().to_str().unwrap(), None, None)
            .expect("cli helper should succeed");

        let report: RigReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.joints.len(), 4);
        assert_eq!(report.iris_scale, 0.5);
    }

    #[test]
    fn flag_overrides_input_control_value() {
        let input_file = NamedTempFile::new().unwrap();
        write_json(&rig_input(0.5), input_file.path());

        let json = run_eye_rig_from_files(input_file.path().to_str().unwrap(), None, Some(-0.25))
            .unwrap();
        let report: RigReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.iris_scale, -0.25);
    }

    #[test]
    fn config_file_selects_cosine_policy() {
        let input_file = NamedTempFile::new().unwrap();
        let config_file = NamedTempFile::new().unwrap();
        write_json(&rig_input(1.25), input_file.path());

        let path = input_file.path().to_str().unwrap();
        let err = run_eye_rig_from_files(path, None, None).unwrap_err();
        assert!(err.to_string().contains("joint parameters"), "{err}");

        let config = RigConfig {
            cosine_domain: CosineDomainPolicy::Clamp,
            ..RigConfig::default()
        };
        write_json(&config, config_file.path());
        let json =
            run_eye_rig_from_files(path, Some(config_file.path().to_str().unwrap()), None).unwrap();
        let report: RigReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.joints[3].spec.cos_param, 1.0);
    }

    #[test]
    fn bundled_sample_input_builds() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/eye_rig.json");
        let json = run_eye_rig_from_files(path.to_str().unwrap(), None, None).unwrap();
        let report: RigReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.joints.len(), 8);
        assert!((report.sample.radius - 1.0).abs() < 1e-9);
        assert!((report.sample.pupil_distance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn error_names_the_missing_guide() {
        let input_file = NamedTempFile::new().unwrap();
        let mut input = rig_input(0.5);
        input.guides.pupil = "L_pupil_typo".to_string();
        write_json(&input, input_file.path());

        let err = run_eye_rig_from_files(input_file.path().to_str().unwrap(), None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to sample guides"), "{err}");
        assert!(err.contains("L_pupil_typo"), "{err}");
    }

    #[test]
    fn error_names_the_out_of_domain_joint() {
        let input_file = NamedTempFile::new().unwrap();
        write_json(&rig_input(1.25), input_file.path());

        let err = run_eye_rig_from_files(input_file.path().to_str().unwrap(), None, None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("joint 3"), "{err}");
    }

    #[test]
    fn missing_input_file_is_an_error() {
        assert!(run_eye_rig_from_files("/nonexistent/rig.json", None, None).is_err());
    }

    #[test]
    fn args_accept_negative_iris_scale() {
        let args = Args::try_parse_from(["iris-cli", "--input", "rig.json", "--iris-scale", "-0.5"])
            .unwrap();
        assert_eq!(args.iris_scale, Some(-0.5));
        assert_eq!(args.config, None);
    }
}
