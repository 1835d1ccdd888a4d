use clap::{Parser, Subcommand};
use memberstore::{
    Identity, Member, MemberPatch, MemberService, MemoryStore, RegistrationDetails, StoreConfig,
    UnitOfWork,
};
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memberstore")]
#[command(about = "Member registration store running against the embedded backend")]
struct Cli {
    /// Store URL, memberstore://host:port/database
    #[arg(long, default_value = "memberstore://localhost:27017/memberstore")]
    url: String,

    /// Register unknown callers from their claims instead of asking them to complete registration
    #[arg(long)]
    auto_register: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed members, page through them, then update and delete one
    Demo {
        #[arg(long, default_value_t = 5)]
        members: u32,
        #[arg(long)]
        page_size: Option<i64>,
    },
    /// Run the registration workflow for one caller
    Register {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone_number: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::from_url(&cli.url)?.complete_registration_enabled(!cli.auto_register);
    tracing::info!(url = %config.to_url(), "using embedded store");

    let store = MemoryStore::new();
    let service = MemberService::from_config(&config);
    service.repo().ensure_indexes(&store).await?;

    match cli.command {
        Command::Demo { members, page_size } => {
            let page_size = page_size.unwrap_or(config.default_page_size);
            demo(&store, &service, members, page_size).await?;
        }
        Command::Register {
            subject,
            email,
            first_name,
            last_name,
            phone_number,
        } => {
            let identity = Identity::new(subject).with_email(email);
            let details = RegistrationDetails {
                first_name,
                last_name,
                phone_number,
            };
            let mut uow = UnitOfWork::new(store.clone());
            let status = service.check_registration(&mut uow, &identity).await?;
            println!("gate: {}", serde_json::to_string(&status)?);

            let member = service.complete_registration(&mut uow, &identity, details).await;
            match member {
                Ok(member) => println!("{}", serde_json::to_string_pretty(&member)?),
                Err(err) => println!("registration rejected: {err}"),
            }
            uow.close().await;
        }
    }

    let stats = store.stats();
    tracing::info!(
        sessions = stats.sessions_started,
        committed = stats.transactions_committed,
        aborted = stats.transactions_aborted,
        "done"
    );
    Ok(())
}

async fn demo(
    store: &MemoryStore,
    service: &MemberService,
    members: u32,
    page_size: i64,
) -> Result<(), Box<dyn Error>> {
    let mut uow = UnitOfWork::new(store.clone());

    for n in 1..=members {
        let member = Member::new(format!("demo|{n}"), format!("member{n}"), format!("member{n}@example.com"))
            .with_name("Demo", format!("Member {n}"));
        service.repo().register(&mut uow, &member).await?;
    }

    let mut cursor: Option<String> = None;
    let mut first_id = None;
    loop {
        let page = service.list(&mut uow, page_size, cursor.as_deref()).await?;
        first_id = first_id.or_else(|| page.data.first().and_then(|m| m.id));
        println!("{}", serde_json::to_string(&page)?);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    if let Some(id) = first_id {
        let id = id.to_hex();
        service
            .update(&mut uow, &id, MemberPatch::default().phone_number("+1 555 0100"))
            .await?;
        if let Some(member) = service.find_by_id(&mut uow, &id).await? {
            println!("updated: {}", serde_json::to_string(&member)?);
        }
        let deleted = service.delete_by_id(&mut uow, &id).await?;
        println!("deleted: {}", deleted.deleted_count);
    }

    uow.close().await;
    Ok(())
}
