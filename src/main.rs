use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use librdice::{DiceConfig, DiceTable, FaceMap, PlaybackMode, Pose, RollEvent, RollRequest, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// CLI for predicted dice rolls
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dice expressions to roll (format: 2D6, 1D8=3 to force every die of the group to 3)
    #[arg(required = true, value_parser = parse_dice_notation)]
    dice_expressions: Vec<DiceExpr>,

    /// Output format: text, json, csv
    #[arg(short, long, default_value = "text", value_parser = ["text", "json", "csv"])]
    output: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Mass for each die
    #[arg(long, default_value_t = 0.17)]
    mass: f32,

    /// Number of rolls for batch mode
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// TOML engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Squeeze playback into this many seconds instead of one pose per tick
    #[arg(long)]
    timed: Option<f32>,

    /// Seed for impulses and alias-face selection
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DiceExpr {
    count: u32,
    sides: u32,
    forced: Option<i32>,
}

impl DiceExpr {
    fn die_type(&self) -> String {
        format!("D{}", self.sides)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RollResult {
    die_type: String,
    value: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requested: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimulationResult {
    results: Vec<RollResult>,
    total: i32,
    /// Ticks the shared prediction pass took.
    ticks: usize,
}

const SUPPORTED_SIDES: [u32; 3] = [4, 6, 8];
const DIE_SPACING: f32 = 2.0;
const DROP_HEIGHT: f32 = 1.0;

/// Parse dice notation like 2D6, 1D8=3, etc.
fn parse_dice_notation(s: &str) -> Result<DiceExpr, String> {
    let s = s.to_uppercase();
    let (dice, forced) = match s.split_once('=') {
        Some((dice, value)) => {
            let value: i32 = value
                .parse()
                .map_err(|_| format!("Invalid forced value in dice notation: {}", s))?;
            (dice, Some(value))
        }
        None => (s.as_str(), None),
    };

    let Some((count_str, sides_str)) = dice.split_once('D') else {
        return Err(format!("Invalid dice notation: {}. Format should be like 2D6 or 2D6=4", s));
    };
    if count_str.is_empty() || sides_str.is_empty() {
        return Err(format!("Invalid dice notation: {}", s));
    }

    let count: u32 = count_str
        .parse()
        .map_err(|_| format!("Invalid count in dice notation: {}", s))?;
    let sides: u32 = sides_str
        .parse()
        .map_err(|_| format!("Invalid sides in dice notation: {}", s))?;

    if !SUPPORTED_SIDES.contains(&sides) {
        return Err(format!("Invalid number of sides: {}. Must be one of 4, 6, 8", sides));
    }
    if count == 0 {
        return Err(format!("Invalid count: {}. Must be greater than 0", count));
    }
    if let Some(v) = forced {
        if v < 1 || v as u32 > sides {
            return Err(format!("Invalid forced value: {}. A D{} shows 1 to {}", v, sides, sides));
        }
    }

    Ok(DiceExpr { count, sides, forced })
}

fn load_config(args: &Args) -> Result<DiceConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => DiceConfig::from_path(path)?,
        None => DiceConfig::default(),
    };
    if let Some(duration) = args.timed {
        config.playback = PlaybackMode::Timed { duration };
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

/// Random impulse with every component in [1, 10).
fn random_impulse<R: Rng>(rng: &mut R) -> Vector3<f32> {
    Vector3::new(rng.gen_range(1.0..10.0), rng.gen_range(1.0..10.0), rng.gen_range(1.0..10.0))
}

fn run_simulation(args: &Args, config: &DiceConfig) -> Result<Vec<SimulationResult>, Box<dyn std::error::Error>> {
    let mut all_results = Vec::new();

    for batch in 0..args.batch {
        let mut batch_config = config.clone();
        batch_config.seed = config.seed.map(|s| s.wrapping_add(batch as u64));
        let mut rng = match batch_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut table = DiceTable::new(batch_config)?;
        table.init_world();

        let mut dice = Vec::new();
        for expr in &args.dice_expressions {
            for _ in 0..expr.count {
                let (faces, shape) = FaceMap::standard(expr.sides)
                    .ok_or_else(|| format!("Unsupported die type: D{}", expr.sides))?;
                let x = dice.len() as f32 * DIE_SPACING;
                let id = table.create_die(faces, shape, args.mass, Pose::at(x, DROP_HEIGHT, 0.0))?;
                dice.push((id, expr));
            }
        }

        for (id, expr) in &dice {
            let force = random_impulse(&mut rng);
            let torque = random_impulse(&mut rng);
            let request = match expr.forced {
                Some(value) => RollRequest::forced(value, force, torque),
                None => RollRequest::random(force, torque),
            };
            table.roll(*id, request)?;
        }

        let report = table.run_prediction();
        log::debug!(
            "prediction took {} ticks, {} dice settled, {} still moving",
            report.simulation.ticks,
            report.simulation.settled.len(),
            report.simulation.unsettled.len()
        );
        for failure in &report.failures {
            log::warn!("{}", failure);
        }

        for (id, _) in &dice {
            table.play(*id)?;
        }
        let mut ended = HashMap::new();
        loop {
            let playing = table.step();
            for event in table.drain_events() {
                if let RollEvent::RollEnded { die, face } = event {
                    ended.insert(die, face);
                }
            }
            if !playing {
                break;
            }
        }

        let mut roll_results = Vec::with_capacity(dice.len());
        for (id, expr) in &dice {
            let value = match ended.get(id) {
                Some(face) => *face,
                None => table.resolved_face(*id)?,
            };
            roll_results.push(RollResult {
                die_type: expr.die_type(),
                value,
                requested: expr.forced,
            });
        }

        let total: i32 = roll_results.iter().map(|r| r.value).sum();
        all_results.push(SimulationResult {
            results: roll_results,
            total,
            ticks: report.simulation.ticks,
        });
        table.shutdown();
    }

    Ok(all_results)
}

fn format_output(results: Vec<SimulationResult>, output_format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match output_format {
        "text" => {
            let mut output = String::new();
            for (i, result) in results.iter().enumerate() {
                if results.len() > 1 {
                    output.push_str(&format!("Roll {}: ", i + 1));
                }

                let values: Vec<String> = result
                    .results
                    .iter()
                    .map(|r| match r.requested {
                        Some(_) => format!("{}: {} (forced)", r.die_type, r.value),
                        None => format!("{}: {}", r.die_type, r.value),
                    })
                    .collect();
                output.push_str(&format!("{}\n", values.join(", ")));

                if results.len() > 1 {
                    output.push_str(&format!("  Total: {}\n", result.total));
                } else {
                    output.push_str(&format!("Total: {}\n", result.total));
                }
            }
            Ok(output)
        }
        "json" => {
            if results.len() == 1 {
                Ok(serde_json::to_string_pretty(&results[0])?)
            } else {
                Ok(serde_json::to_string_pretty(&results)?)
            }
        }
        "csv" => {
            let mut output = String::from("Roll,Dice Type,Value,Requested\n");
            for (i, result) in results.iter().enumerate() {
                for roll in &result.results {
                    let requested = roll.requested.map(|v| v.to_string()).unwrap_or_default();
                    output.push_str(&format!("{},{},{},{}\n", i + 1, roll.die_type, roll.value, requested));
                }
            }
            Ok(output)
        }
        _ => Err("Invalid output format".into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&args)?;
    log::info!(
        "rolling {} dice in {} batch(es)",
        args.dice_expressions.iter().map(|e| e.count).sum::<u32>(),
        args.batch
    );

    match run_simulation(&args, &config) {
        Ok(results) => {
            let output = format_output(results, &args.output)?;
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error during simulation: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(exprs: &[&str]) -> Args {
        let mut argv = vec!["riggeddice"];
        argv.extend_from_slice(exprs);
        argv.extend_from_slice(&["--seed", "42"]);
        Args::parse_from(argv)
    }

    fn sample() -> Vec<SimulationResult> {
        vec![SimulationResult {
            results: vec![
                RollResult {
                    die_type: "D6".to_string(),
                    value: 4,
                    requested: Some(4),
                },
                RollResult {
                    die_type: "D8".to_string(),
                    value: 7,
                    requested: None,
                },
            ],
            total: 11,
            ticks: 120,
        }]
    }

    #[test]
    fn test_parse_dice_notation_valid() {
        assert!(parse_dice_notation("2D6").is_ok());
        assert!(parse_dice_notation("1D8").is_ok());
        assert!(parse_dice_notation("3D4").is_ok());
        assert_eq!(
            parse_dice_notation("2D6=5").unwrap(),
            DiceExpr {
                count: 2,
                sides: 6,
                forced: Some(5)
            }
        );
    }

    #[test]
    fn test_parse_dice_notation_invalid_format() {
        assert!(parse_dice_notation("2D").is_err());
        assert!(parse_dice_notation("D6").is_err());
        assert!(parse_dice_notation("26").is_err());
        assert!(parse_dice_notation("").is_err());
        assert!(parse_dice_notation("2D6=").is_err());
        assert!(parse_dice_notation("2D6=x").is_err());
    }

    #[test]
    fn test_parse_dice_notation_invalid_values() {
        assert!(parse_dice_notation("0D6").is_err()); // Count must be > 0
        assert!(parse_dice_notation("2D20").is_err()); // Only d4, d6 and d8
        assert!(parse_dice_notation("2D6=7").is_err());
        assert!(parse_dice_notation("1D4=0").is_err());
    }

    #[test]
    fn test_parse_dice_notation_lowercase() {
        let expr = parse_dice_notation("2d8=3").unwrap();
        assert_eq!(expr.die_type(), "D8");
        assert_eq!(expr.forced, Some(3));
    }

    #[test]
    fn test_format_output_text() {
        let output = format_output(sample(), "text").unwrap();
        assert!(output.contains("D6: 4 (forced)"));
        assert!(output.contains("D8: 7"));
        assert!(output.contains("Total: 11"));
    }

    #[test]
    fn test_format_output_json() {
        let output = format_output(sample(), "json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["total"], 11);
        assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["results"][0]["requested"], 4);
        assert!(parsed["results"][1].get("requested").is_none());
        assert_eq!(parsed["results"][1]["value"], 7);
    }

    #[test]
    fn test_format_output_csv() {
        let output = format_output(sample(), "csv").unwrap();
        assert!(output.contains("Roll,Dice Type,Value,Requested"));
        assert!(output.contains("1,D6,4,4"));
        assert!(output.contains("1,D8,7,\n"));
    }

    #[test]
    fn test_format_output_invalid_format() {
        assert!(format_output(sample(), "invalid").is_err());
    }

    #[test]
    fn test_load_config_applies_flags() {
        let mut a = args(&["1D6", "--timed", "1.5"]);
        let config = load_config(&a).unwrap();
        assert_eq!(config.playback, PlaybackMode::Timed { duration: 1.5 });
        assert_eq!(config.seed, Some(42));

        a.timed = Some(0.0);
        assert!(load_config(&a).is_err());
    }

    #[test]
    fn test_forced_dice_report_requested_values() {
        let a = args(&["2D6=6", "1D4=2", "1D8=8"]);
        let config = load_config(&a).unwrap();
        let results = run_simulation(&a, &config).unwrap();
        assert_eq!(results.len(), 1);
        let values: Vec<i32> = results[0].results.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![6, 6, 2, 8]);
        assert_eq!(results[0].total, 22);
        assert!(results[0].ticks <= config.max_iterations);
    }

    #[test]
    fn test_random_dice_stay_in_range_across_batches() {
        let mut a = args(&["3D8"]);
        a.batch = 2;
        let config = load_config(&a).unwrap();
        let results = run_simulation(&a, &config).unwrap();
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.results.len(), 3);
            assert!(result.results.iter().all(|r| (1..=8).contains(&r.value)));
        }
    }
}
