use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{Draft, RecordApi, RecordsClient, StudentController};
use shared::domain::{RecordId, Student, Subject};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Manage student records on a records server")]
struct Cli {
    #[arg(long, env = "RECORDS_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show records, optionally filtered by name or roll number.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Add {
        name: String,
        age: String,
        roll_no: String,
        /// Repeat for each subject, e.g. `--subject "Computer Science"`.
        #[arg(long = "subject", required = true)]
        subjects: Vec<Subject>,
    },
    /// Change some fields of a record; the rest keep their value.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        roll_no: Option<String>,
        /// Replaces the whole subject list when given.
        #[arg(long = "subject")]
        subjects: Vec<Subject>,
    },
    Delete {
        id: String,
    },
    /// Print the subjects a record can hold.
    Subjects,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Subjects => {
            for subject in Subject::ALL {
                println!("{subject}");
            }
        }
        Command::List { search, json } => {
            let mut controller = connect(&cli.server_url)?;
            controller.load().await?;
            if let Some(term) = search {
                controller.search(&term);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(controller.visible_records())?);
            } else {
                print_table(controller.visible_records());
            }
        }
        Command::Add {
            name,
            age,
            roll_no,
            subjects,
        } => {
            let mut controller = connect(&cli.server_url)?;
            let mut draft = Draft {
                name,
                age,
                roll_no,
                subjects: Vec::new(),
            };
            for subject in subjects {
                draft.add_subject(subject);
            }
            let created = controller.add_record(draft).await?;
            println!("created id={}", created.id);
        }
        Command::Edit {
            id,
            name,
            age,
            roll_no,
            subjects,
        } => {
            let mut controller = connect(&cli.server_url)?;
            let id = RecordId::new(id);
            edit_record(&mut controller, &id, name, age, roll_no, subjects).await?;
            println!("updated id={id}");
        }
        Command::Delete { id } => {
            let mut controller = connect(&cli.server_url)?;
            let id = RecordId::new(id);
            controller.remove_record(&id).await?;
            println!("deleted id={id}");
        }
    }

    Ok(())
}

fn connect(server_url: &str) -> Result<StudentController<RecordsClient>> {
    let client = RecordsClient::new(server_url)?;
    debug!(url = %client.records_url(), "using records server");
    Ok(StudentController::new(client))
}

async fn edit_record<A: RecordApi>(
    controller: &mut StudentController<A>,
    id: &RecordId,
    name: Option<String>,
    age: Option<String>,
    roll_no: Option<String>,
    subjects: Vec<Subject>,
) -> Result<()> {
    controller.load().await?;
    let mut draft = controller
        .begin_edit(id)
        .with_context(|| format!("cannot edit record {id}"))?;
    if let Some(name) = name {
        draft.name = name;
    }
    if let Some(age) = age {
        draft.age = age;
    }
    if let Some(roll_no) = roll_no {
        draft.roll_no = roll_no;
    }
    if !subjects.is_empty() {
        draft.subjects.clear();
        for subject in subjects {
            draft.add_subject(subject);
        }
    }
    controller.save_edit(id, &draft).await?;
    Ok(())
}

fn print_table(records: &[Student]) {
    if records.is_empty() {
        println!("no records");
        return;
    }
    println!("{:<26} {:<24} {:>4} {:>8}  subjects", "id", "name", "age", "roll no");
    for record in records {
        let subjects: Vec<&str> = record.subjects.iter().map(|s| s.as_str()).collect();
        println!(
            "{:<26} {:<24} {:>4} {:>8}  {}",
            record.id.as_str(),
            record.name,
            record.age,
            record.roll_no,
            subjects.join(", ")
        );
    }
}
