// Academic Records - CLI
// Every command prints its result as JSON on stdout; logs go to stderr.

use academic_records::{
    EngineConfig, GradeRecordFilter, GradeUpdate, NewGradeRecord, PeriodFilter, RecordsEngine,
    TranscriptType,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: academic-records <command> [args] [--option value]

Commands:
  init                                              create the database schema
  create <course> <student> <score> <semester> <year> [--comment TEXT]
  update <record_id> [--score N] [--comment TEXT]
  finalize <record_id> [--actor ID]
  show <record_id>
  list [--student ID] [--course ID] [--finalized true|false] [--semester S] [--year YYYY-YYYY]
  gpa <student> [--semester S] [--year YYYY-YYYY]
  prereqs <student> <course>
  transcript <student> [--type unofficial|interim] [--semester S] [--year YYYY-YYYY] [--actor ID]
  certify <transcript_id> [--actor ID]
  latest <student> [--type T]
  summary <student>

Configuration: ACADEMIC_RECORDS_CONFIG, ACADEMIC_RECORDS_DB, ACADEMIC_RECORDS_CATALOG,
ACADEMIC_RECORDS_STUDENTS, ACADEMIC_RECORDS_BUSY_TIMEOUT_MS";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = EngineConfig::from_env()?;
    let parsed = Args::parse(rest)?;

    if command == "init" {
        config.open_database()?;
        println!("✓ Database initialized at {:?}", config.database_path);
        return Ok(());
    }

    let engine = config.build_engine()?;
    run(&engine, &config, command, &parsed)
}

fn run(engine: &RecordsEngine, config: &EngineConfig, command: &str, args: &Args) -> Result<()> {
    let actor = args.option("actor").unwrap_or(config.default_actor.as_str());

    match command {
        "create" => {
            let [course_id, student_id, score, semester, academic_year] = args.positional::<5>()?;
            let record = engine.create_grade_record(NewGradeRecord {
                course_id: course_id.to_string(),
                student_id: student_id.to_string(),
                score: score
                    .parse::<f64>()
                    .with_context(|| format!("score must be a number, got {:?}", score))?,
                semester: semester.parse()?,
                academic_year: academic_year.parse()?,
                comment: args.option("comment").map(str::to_string),
            })?;
            print_json(&record)
        }
        "update" => {
            let [id] = args.positional::<1>()?;
            let score = args
                .option("score")
                .map(|s| {
                    s.parse::<f64>()
                        .with_context(|| format!("score must be a number, got {:?}", s))
                })
                .transpose()?;
            let update = GradeUpdate {
                score,
                comment: args.option("comment").map(str::to_string),
            };
            print_json(&engine.update_grade_record(id, update)?)
        }
        "finalize" => {
            let [id] = args.positional::<1>()?;
            print_json(&engine.finalize_grade_record(id, actor)?)
        }
        "show" => {
            let [id] = args.positional::<1>()?;
            print_json(&engine.get_grade_record(id)?)
        }
        "list" => {
            let period = args.period()?;
            let filter = GradeRecordFilter {
                course_id: args.option("course").map(str::to_string),
                student_id: args.option("student").map(str::to_string),
                finalized: args
                    .option("finalized")
                    .map(|f| f.parse::<bool>().context("--finalized must be true or false"))
                    .transpose()?,
                semester: period.semester,
                academic_year: period.academic_year,
            };
            print_json(&engine.list_grade_records(&filter)?)
        }
        "gpa" => {
            let [student_id] = args.positional::<1>()?;
            let gpa = engine.calculate_gpa(student_id, args.period()?)?;
            print_json(&serde_json::json!({ "student_id": student_id, "gpa": gpa }))
        }
        "prereqs" => {
            let [student_id, course_id] = args.positional::<2>()?;
            print_json(&engine.validate_prerequisites(student_id, course_id)?)
        }
        "transcript" => {
            let [student_id] = args.positional::<1>()?;
            let transcript_type = args.transcript_type()?.unwrap_or_default();
            let period = args.period()?;
            print_json(&engine.generate_transcript(student_id, transcript_type, period, actor)?)
        }
        "certify" => {
            let [id] = args.positional::<1>()?;
            print_json(&engine.certify_transcript(id, actor)?)
        }
        "latest" => {
            let [student_id] = args.positional::<1>()?;
            print_json(&engine.get_latest_transcript(student_id, args.transcript_type()?)?)
        }
        "summary" => {
            let [student_id] = args.positional::<1>()?;
            print_json(&engine.get_transcript_summary(student_id)?)
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// ARGUMENT PARSING
// ============================================================================

/// Positional arguments plus `--key value` options
struct Args {
    positional: Vec<String>,
    options: HashMap<String, String>,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut options = HashMap::new();
        let mut iter = raw.iter();

        while let Some(arg) = iter.next() {
            match arg.strip_prefix("--") {
                Some(key) => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--{} needs a value", key))?;
                    options.insert(key.to_string(), value.clone());
                }
                None => positional.push(arg.clone()),
            }
        }

        Ok(Args { positional, options })
    }

    fn positional<const N: usize>(&self) -> Result<[&str; N]> {
        if self.positional.len() != N {
            bail!(
                "expected {} positional argument(s), got {}\n\n{}",
                N,
                self.positional.len(),
                USAGE
            );
        }
        let mut out = [""; N];
        for (slot, value) in out.iter_mut().zip(&self.positional) {
            *slot = value.as_str();
        }
        Ok(out)
    }

    fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    fn period(&self) -> Result<PeriodFilter> {
        Ok(PeriodFilter::parse(self.option("semester"), self.option("year"))?)
    }

    fn transcript_type(&self) -> Result<Option<TranscriptType>> {
        Ok(self.option("type").map(str::parse::<TranscriptType>).transpose()?)
    }
}
