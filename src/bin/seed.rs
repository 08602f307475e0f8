use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;

use gradebook::{
    domain::{
        ActorRef, CreateAnnouncementRequest, CreateUserRequest, MaintenanceType, Role, Severity,
        UpdateMaintenanceRequest,
    },
    repository::{
        SqliteAnnouncementRepository, SqliteMaintenanceRepository, SqliteUserRepository,
        UserRepository,
    },
    service::{announcement_service::AnnouncementService, maintenance_service::MaintenanceService},
};

/// Populate a GradeBook database with demo users and announcements.
#[derive(Parser, Debug)]
#[command(name = "seed", version)]
struct Args {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://gradebook.db?mode=rwc")]
    database_url: String,

    /// Password given to every seeded account
    #[arg(long, default_value = "password123")]
    password: String,

    /// Leave the system in maintenance mode after seeding
    #[arg(long)]
    maintenance: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("Seeding {}", args.database_url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let users = SqliteUserRepository::new(db_pool.clone());
    let announcements = AnnouncementService::new(Arc::new(SqliteAnnouncementRepository::new(
        db_pool.clone(),
    )));
    let maintenance = MaintenanceService::new(Arc::new(SqliteMaintenanceRepository::new(
        db_pool.clone(),
    )));

    let accounts = [
        ("root", "Root Operator", Role::Superadmin),
        ("admin", "School Admin", Role::Admin),
        ("mrivera", "Maria Rivera", Role::Teacher),
        ("jdoe", "Jamie Doe", Role::Student),
        ("pdoe", "Pat Doe", Role::Parent),
        ("office", "Front Office", Role::Secretary),
    ];

    let mut admin = None;
    for (username, full_name, role) in accounts {
        if users.find_by_username(username).await?.is_some() {
            println!("  user {} already exists, skipping", username);
            continue;
        }
        let user = users
            .create(CreateUserRequest {
                username: username.to_string(),
                full_name: full_name.to_string(),
                email: format!("{}@gradebook.local", username),
                password: args.password.clone(),
                role,
            })
            .await?;
        println!("  created {} ({})", user.username, user.role);
        if role == Role::Admin {
            admin = Some(user);
        }
    }

    let Some(admin) = admin.or(users.find_by_username("admin").await?) else {
        anyhow::bail!("no admin account available to author announcements");
    };
    let actor = ActorRef::from(&admin);
    let now = Utc::now();

    let samples = [
        (
            "Gradebook upgrade tonight",
            "Grades are read-only between 22:00 and 23:00 while we upgrade the database.",
            Severity::Scheduled,
            now + Duration::hours(6),
            now + Duration::hours(7),
            None,
        ),
        (
            "Report cards published",
            "Term 1 report cards are now available to parents and students.",
            Severity::Info,
            now - Duration::hours(1),
            now + Duration::days(7),
            Some(vec![Role::Parent, Role::Student]),
        ),
        (
            "Attendance sync delayed",
            "Attendance entered today may take up to an hour to appear.",
            Severity::Warning,
            now - Duration::minutes(30),
            now + Duration::hours(4),
            Some(vec![Role::Teacher, Role::Secretary]),
        ),
    ];

    for (title, message, severity, start, end, roles) in samples {
        let created = announcements
            .create(
                CreateAnnouncementRequest {
                    title: title.to_string(),
                    message: message.to_string(),
                    severity,
                    scheduled_start: start,
                    scheduled_end: end,
                    target_roles: roles,
                    affected_services: Some(vec!["grades".to_string()]),
                    show_on_dashboard: Some(true),
                },
                actor.clone(),
                now,
            )
            .await?;
        println!("  announcement \"{}\"", created.title);
    }

    if args.maintenance {
        maintenance
            .update(
                UpdateMaintenanceRequest {
                    is_maintenance_mode: Some(true),
                    maintenance_type: Some(MaintenanceType::Scheduled),
                    reason: Some(Some("Seeded maintenance window".to_string())),
                    estimated_completion: Some(Some(now + Duration::hours(1))),
                    ..Default::default()
                },
                &actor,
                now,
            )
            .await?;
        println!("  maintenance mode enabled");
    }

    println!("Accounts:");
    for user in users.list().await? {
        println!("  {:<10} {}", user.username, user.role);
    }
    println!("Done. Seeded accounts use password '{}'.", args.password);
    Ok(())
}
