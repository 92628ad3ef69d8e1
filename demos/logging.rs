//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use service_container::{
    Args, ClassDef, Container, Definition, Param, ProviderClass, ProviderType, Result,
    ServiceProvider, Value,
};
use std::sync::Arc;

#[derive(Default)]
struct FileLogger;

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    logger: Arc<FileLogger>,
    db: Arc<Database>,
}

struct DatabaseServiceProvider;

impl ServiceProvider for DatabaseServiceProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.register_class(ClassDef::new::<Database, _>(
            "Database",
            [Param::new("url").with_default("postgres://localhost/app")],
            |args| Ok(Database { url: args.cloned(0)? }),
        ));
        container.singleton("Database", "Database");
        Ok(())
    }
}

impl ProviderType for DatabaseServiceProvider {
    const DEFER: Option<bool> = Some(true);

    fn construct(_: &Container) -> Result<Self> {
        println!("  [App] Constructing DatabaseServiceProvider...");
        Ok(DatabaseServiceProvider)
    }
}

fn main() -> Result<()> {
    // JSON with logging-json, pretty with logging-pretty
    service_container::logging::init();

    println!("=== Service Container Logging Demo ===\n");

    // logs: "Creating new service container"
    let container = Container::new();

    // logs: "Registering class"
    container.register_class(ClassDef::without_constructor::<FileLogger>("FileLogger"));
    container.register_class(ClassDef::new::<UserService, _>(
        "UserService",
        [Param::service("logger", "Logger"), Param::service("db", "Database")],
        |args| {
            Ok(UserService {
                logger: args.get(0)?,
                db: args.get(1)?,
            })
        },
    ));

    // logs: "Binding service"
    container.singleton("Logger", "FileLogger");
    container.bind(
        "clock",
        Definition::factory(|_, _, _| Ok(Value::new(std::time::SystemTime::now()))),
    );

    // logs: "Deferring service provider"
    container.configure([ProviderClass::of::<DatabaseServiceProvider>()])?;
    println!("Deferred services: {:?}\n", container.deferred_services());

    // logs: "Activating deferred service provider", then per-parameter traces
    println!("Resolving UserService...");
    let _users = container.make("UserService")?;

    // logs: "Service resolved from cache" at TRACE
    let _logger = container.make("Logger")?;
    let _now = container.make_with("clock", Args::none(), Default::default(), false)?;

    // logs: "Booting container"
    container.boot()?;

    // Failures are logged before they are returned
    if let Err(err) = container.make("Mailer") {
        println!("Expected failure: {err}");
    }

    println!("\n{container:?}");
    println!("\n=== Demo Complete ===");
    Ok(())
}
