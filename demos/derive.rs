//! Example demonstrating the #[derive(Autowire)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use service_container::{Args, Autowire, ClassDef, Container, Result};
use std::sync::Arc;

#[derive(Default)]
struct FileLogger;

#[derive(Default)]
struct RedisCache;

// Class name defaults to the struct name
#[derive(Autowire)]
struct UserService {
    #[inject("Logger")]
    logger: Arc<FileLogger>,
    #[inject]
    cache: Arc<RedisCache>,
    table: String,
    #[param(default)]
    page_size: u32,
}

#[derive(Autowire)]
#[autowire(name = "Reports")]
struct ReportService {
    #[inject]
    users: Arc<UserService>,
}

fn main() -> Result<()> {
    let container = Container::new();

    container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
    container.register_class(ClassDef::without_constructor::<RedisCache>("RedisCache"));
    container.register_class_of::<UserService>();
    container.register_class_of::<ReportService>();

    container.singleton("Logger", "FileLogger");
    container.singleton("RedisCache", "RedisCache");
    container.bind_with("UserService", "UserService", Args::named([("table", "users")]), true);

    let reports = container.get::<ReportService>("Reports")?;
    let users = &reports.users;

    println!("table: {}", users.table);
    println!("page_size (default): {}", users.page_size);
    println!(
        "shared logger: {}",
        Arc::ptr_eq(&users.logger, &container.get::<FileLogger>("Logger")?)
    );
    println!(
        "shared cache: {}",
        Arc::ptr_eq(&users.cache, &container.get::<RedisCache>("RedisCache")?)
    );

    println!("\nUserService descriptor: {:?}", UserService::class_def());
    Ok(())
}
