use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, info_span, warn};

use labtrack_cli::render::{
    batches_table, case_table, history_table, outcome_line, plate_table, plate_text, queue_table,
    samples_table, well_map_from_assignments,
};
use labtrack_core::{
    BatchMeta, DEFAULT_CONFIG_FILE, ErrorKind, FamilyGroup, LabConfig, LabService, NewCase,
    NewMember, NewSample, PlateRequest, PlateSample,
};
use labtrack_model::{LabNumber, SampleId};
use labtrack_store::FileStore;

use crate::cli::{
    BatchCommand, CaseCommand, CaseCreateArgs, CaseUpdateArgs, Cli, PlateAllocateArgs,
    PlateCommand, QueueArgs, SampleAddArgs, SampleCommand, SampleListArgs, TransitionArgs,
};

pub type Service = LabService<FileStore>;

/// Loads the config and opens the store named by the flags or the config.
pub fn open_service(cli: &Cli) -> Result<Service> {
    let config = load_config(cli.config.as_deref())?;
    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| config.store.path.clone());
    let store = FileStore::open(&store_path)
        .with_context(|| format!("open store {}", store_path.display()))?;
    LabService::from_config(store, &config).context("apply config")
}

fn load_config(explicit: Option<&Path>) -> Result<LabConfig> {
    if let Some(path) = explicit {
        return LabConfig::load(path).with_context(|| format!("load config {}", path.display()));
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return LabConfig::load(default_path).context("load ./labtrack.toml");
    }
    Ok(LabConfig::default())
}

pub fn run_case(service: &Service, command: &CaseCommand) -> Result<()> {
    match command {
        CaseCommand::Create(args) => run_case_create(service, args),
        CaseCommand::Show { case_number } => {
            let case = service.case_by_number(case_number)?;
            println!("{}", case_table(&case));
            let samples = service.samples_for_case(case.id)?;
            if !samples.is_empty() {
                println!("{}", samples_table(&samples));
            }
            Ok(())
        }
        CaseCommand::Update(args) => run_case_update(service, args),
    }
}

fn run_case_create(service: &Service, args: &CaseCreateArgs) -> Result<()> {
    let data = NewCase {
        category: args.category,
        submitted_on: args
            .submitted_on
            .unwrap_or_else(|| Utc::now().date_naive()),
        mother_present: !args.no_mother,
        comment: args.comment.clone(),
    };
    if args.members.is_empty() {
        let case = service.create_case(&data)?;
        println!("created case {}", case.case_number);
        return Ok(());
    }
    let members: Vec<NewMember> = args.members.iter().cloned().map(NewMember::new).collect();
    let registration = service.register_case(&data, &members)?;
    println!("created case {}", registration.case.case_number);
    println!("{}", samples_table(&registration.samples));
    Ok(())
}

fn run_case_update(service: &Service, args: &CaseUpdateArgs) -> Result<()> {
    let current = service.case_by_number(&args.case_number)?;
    let status = args.status.unwrap_or(current.status);
    let comment = match &args.comment {
        Some(comment) => Some(comment.clone()),
        None => current.comment.clone(),
    };
    let case = service.update_case(current.id, status, comment)?;
    println!("{}", case_table(&case));
    Ok(())
}

pub fn run_sample(service: &Service, command: &SampleCommand) -> Result<()> {
    match command {
        SampleCommand::Add(args) => run_sample_add(service, args),
        SampleCommand::List(args) => run_sample_list(service, args),
        SampleCommand::Transition(args) => run_transition(service, args),
        SampleCommand::Cancel { lab_number, reason } => {
            let sample = service.sample_by_lab_number(lab_number)?;
            let sample = service.cancel_sample(sample.id, reason.clone())?;
            println!("cancelled sample {}", sample.lab_number);
            Ok(())
        }
        SampleCommand::History { lab_number } => {
            let sample = service.sample_by_lab_number(lab_number)?;
            let history = service.transition_history(sample.id)?;
            if history.is_empty() {
                println!("sample {} has no recorded transitions", sample.lab_number);
            } else {
                println!("{}", history_table(&history));
            }
            Ok(())
        }
    }
}

fn run_sample_add(service: &Service, args: &SampleAddArgs) -> Result<()> {
    let case = service.case_by_number(&args.case_number)?;
    let sample = service.create_sample(&NewSample {
        case_id: case.id,
        relation: args.relation.clone(),
        lab_number: args.lab_number,
        donor_name: args.donor_name.clone(),
        collected_on: args.collected_on,
    })?;
    println!("added sample {} to case {}", sample.lab_number, case.case_number);
    Ok(())
}

fn run_sample_list(service: &Service, args: &SampleListArgs) -> Result<()> {
    let samples = match (&args.case_number, args.state) {
        (Some(case_number), _) => {
            let case = service.case_by_number(case_number)?;
            service.samples_for_case(case.id)?
        }
        (None, Some(state)) => service.samples_in_state(state)?,
        (None, None) => bail!("either --case or --state is required"),
    };
    println!("{}", samples_table(&samples));
    Ok(())
}

fn run_transition(service: &Service, args: &TransitionArgs) -> Result<()> {
    let span = info_span!("transition", state = %args.state, requested = args.lab_numbers.len());
    let _guard = span.enter();

    let mut labels = BTreeMap::new();
    let mut unknown = Vec::new();
    for lab_number in &args.lab_numbers {
        match service.sample_by_lab_number(lab_number) {
            Ok(sample) => {
                labels.insert(sample.id, sample.lab_number);
            }
            Err(error) if error.kind() == ErrorKind::NotFound => unknown.push(*lab_number),
            Err(error) => return Err(error.into()),
        }
    }
    for lab_number in &unknown {
        warn!(lab_number = %lab_number, "unknown lab number");
    }
    if labels.is_empty() {
        bail!("none of the given lab numbers exist");
    }

    let ids: Vec<SampleId> = labels.keys().copied().collect();
    let outcome = service.transition_samples(&ids, args.state)?;
    println!("{}", outcome_line(&outcome, args.state));
    for lab_number in &unknown {
        println!("  {lab_number}: not found");
    }
    for rejected in &outcome.rejected {
        let label = labels
            .get(&rejected.sample_id)
            .map_or_else(|| rejected.sample_id.to_string(), LabNumber::to_string);
        println!("  {label}: {}", rejected.reason);
    }
    Ok(())
}

pub fn run_queue(service: &Service, args: &QueueArgs) -> Result<()> {
    let counts = service.queue_counts()?;
    println!("{}", queue_table(&counts));
    if let Some(state) = args.state {
        let samples = service.samples_in_state(state)?;
        if !samples.is_empty() {
            println!("{}", samples_table(&samples));
        }
    }
    Ok(())
}

pub fn run_plate(service: &Service, command: &PlateCommand) -> Result<()> {
    match command {
        PlateCommand::Allocate(args) => run_plate_allocate(service, args),
    }
}

fn run_plate_allocate(service: &Service, args: &PlateAllocateArgs) -> Result<()> {
    let span = info_span!("plate_allocate", samples = args.lab_numbers.len());
    let _guard = span.enter();

    let samples = plate_samples(service, &args.lab_numbers)?;
    let controls = if args.no_controls {
        Vec::new()
    } else if args.controls.is_empty() {
        service.default_controls().to_vec()
    } else {
        args.controls.clone()
    };
    let mut request = PlateRequest::new(samples, controls);
    if let Some(anchor) = args.anchor {
        let members = plate_samples(service, &args.group)?;
        request = request.with_group(FamilyGroup { anchor, members });
    }
    let mut map = service.allocate_plate(&request)?;
    if let Some(column) = args.fill_column {
        let column_samples = plate_samples(service, &args.column_samples)?;
        map = service.fill_column(&map, column, &column_samples)?;
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&map).context("serialize well map")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "well map written");
    }
    if args.plain {
        println!("{}", plate_text(&map));
    } else {
        println!("{}", plate_table(&map));
    }

    if args.commit.commit {
        let (Some(batch_number), Some(operator)) =
            (&args.commit.batch_number, &args.commit.operator)
        else {
            bail!("--commit needs --batch-number and --operator");
        };
        let mut meta = BatchMeta::new(batch_number.clone(), args.commit.kind.into(), operator);
        meta.pcr_date = args.commit.pcr_date;
        meta.electro_date = args.commit.electro_date;
        meta.settings.clone_from(&args.commit.settings);
        let batch = service.commit_batch(&meta, &map)?;
        println!(
            "committed batch {} with {} sample(s)",
            batch.batch_number, batch.total_samples
        );
    }
    Ok(())
}

fn plate_samples(service: &Service, lab_numbers: &[LabNumber]) -> Result<Vec<PlateSample>> {
    let ids = lab_numbers
        .iter()
        .map(|lab_number| Ok(service.sample_by_lab_number(lab_number)?.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(service.plate_samples(&ids)?)
}

pub fn run_batch(service: &Service, command: &BatchCommand) -> Result<()> {
    match command {
        BatchCommand::Show {
            batch_number,
            plain,
        } => {
            let detail = service.batch(batch_number)?;
            println!("{}", batches_table(std::slice::from_ref(&detail.batch)));
            let map = well_map_from_assignments(service.geometry(), &detail.wells);
            if *plain {
                println!("{}", plate_text(&map));
            } else {
                println!("{}", plate_table(&map));
            }
            Ok(())
        }
        BatchCommand::List => {
            let batches = service.batches()?;
            if batches.is_empty() {
                println!("no batches");
            } else {
                println!("{}", batches_table(&batches));
            }
            Ok(())
        }
        BatchCommand::Complete { batch_number } => {
            let completion = service.complete_batch(batch_number)?;
            println!(
                "completed batch {}; {} sample(s) advanced",
                completion.batch.batch_number, completion.advanced
            );
            Ok(())
        }
    }
}
