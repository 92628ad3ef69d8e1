//! Application bootstrap: configure providers, boot, resolve through
//! deferred providers, facades and the invoker.

use service_container::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

static BOOT_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
static VIEW_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct FileLogger {
    level: String,
}

struct Router {
    logger: Arc<FileLogger>,
}

struct TemplateEngine {
    root: String,
}

struct LogServiceProvider;

impl ServiceProvider for LogServiceProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.register_class(
            ClassDef::without_constructor::<FileLogger>("FileLogger")
                .property("level", |l: &mut FileLogger, level: String| l.level = level),
        );
        container.singleton(
            "Logger",
            Properties::new().with("class", "FileLogger").with("level", "info"),
        );
        Ok(())
    }

    fn boot(&self, _: &Container) -> Result<()> {
        BOOT_ORDER.lock().unwrap().push("Log");
        Ok(())
    }
}

impl ProviderType for LogServiceProvider {
    const DEFER: Option<bool> = Some(false);

    fn construct(_: &Container) -> Result<Self> {
        Ok(LogServiceProvider)
    }
}

struct RouteServiceProvider;

impl ServiceProvider for RouteServiceProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.register_class(
            ClassDef::new::<Router, _>("Router", [Param::service("logger", "Logger")], |args| {
                Ok(Router { logger: args.get(0)? })
            })
            .method(MethodDef::new(
                "dispatch",
                [Param::new("path"), Param::service("view", "View")],
                |router: &Router, args| {
                    let path: String = args.cloned(0)?;
                    let view = args.get::<TemplateEngine>(1)?;
                    Ok(Value::new(format!(
                        "{} {}{}",
                        router.logger.level, view.root, path
                    )))
                },
            )),
        );
        container.singleton("Router", "Router");
        Ok(())
    }

    fn boot(&self, _: &Container) -> Result<()> {
        BOOT_ORDER.lock().unwrap().push("Route");
        Ok(())
    }
}

impl ProviderType for RouteServiceProvider {
    const DEFER: Option<bool> = Some(false);

    fn construct(_: &Container) -> Result<Self> {
        Ok(RouteServiceProvider)
    }
}

struct ViewServiceProvider;

impl ServiceProvider for ViewServiceProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.register_class(ClassDef::new::<TemplateEngine, _>(
            "TemplateEngine",
            [Param::new("root")],
            |args| Ok(TemplateEngine { root: args.cloned(0)? }),
        ));
        container.bind_with(
            "View",
            "TemplateEngine",
            Args::positional(["/views"]),
            true,
        );
        Ok(())
    }
}

impl ProviderType for ViewServiceProvider {
    fn construct(_: &Container) -> Result<Self> {
        VIEW_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        Ok(ViewServiceProvider)
    }
}

struct Route;

impl Facade for Route {
    const ACCESSOR: &'static str = "Router";
}

#[test]
fn test_application_lifecycle() {
    let container = Container::new();
    container
        .configure(service_container::providers![
            LogServiceProvider,
            RouteServiceProvider,
            ViewServiceProvider,
        ])
        .unwrap();

    assert_eq!(container.registered_providers().len(), 2);
    assert_eq!(container.deferred_services(), ["View"]);
    assert_eq!(
        container.provider_state::<ViewServiceProvider>(),
        ProviderState::Deferred
    );

    container.boot().unwrap();
    assert_eq!(*BOOT_ORDER.lock().unwrap(), ["Log", "Route"]);
    assert_eq!(VIEW_CONSTRUCTED.load(Ordering::SeqCst), 0);

    // Method injection pulls in the deferred view provider.
    let out = Route::call(&container, "dispatch", Args::positional(["/home"])).unwrap();
    assert_eq!(out.downcast_ref::<String>().unwrap(), "info /views/home");
    assert_eq!(VIEW_CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert_eq!(
        container.provider_state::<ViewServiceProvider>(),
        ProviderState::Booted
    );

    // Second dispatch reuses everything.
    Route::call(&container, "dispatch", Args::named([("path", "/about")])).unwrap();
    assert_eq!(VIEW_CONSTRUCTED.load(Ordering::SeqCst), 1);

    let router = Route::get::<Router>(&container).unwrap();
    let logger = container.get::<FileLogger>("Logger").unwrap();
    assert!(Arc::ptr_eq(&router.logger, &logger));
}

#[test]
fn test_call_dispatches_dynamic_callbacks() {
    let container = Container::new();
    container.register_function(Callable::new(
        "greet",
        [Param::new("firstName"), Param::new("greeting").with_default("hello")],
        |args| {
            let name: String = args.cloned(0)?;
            let greeting: String = args.cloned(1)?;
            Ok(Value::new(format!("{greeting} {name}")))
        },
    ));

    let callback = Callback::from_value(&Value::from("greet")).unwrap();
    let out = container
        .call(callback, Args::named([("first_name", "grace")]))
        .unwrap();
    assert_eq!(out.downcast_ref::<String>().unwrap(), "hello grace");

    let err = container
        .call(Callback::Function("greet".into()), Args::none())
        .unwrap_err();
    assert_eq!(err, DiError::missing_parameter("firstName", "greet"));
}
