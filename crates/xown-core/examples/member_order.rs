//! 初始化参数顺序 vs 成员声明顺序
//!
//! 使用方法:
//! ```bash
//! cargo run --example member_order
//! ```

use tracing_subscriber::EnvFilter;
use xown_core::{InitArgs, OrderedComposite, Schema};

struct Noisy(&'static str);

impl Noisy {
    fn new(name: &'static str, value: i32) -> Self {
        println!("  construct {} ({})", name, value);
        Noisy(name)
    }
}

impl Drop for Noisy {
    fn drop(&mut self) {
        println!("  drop {}", self.0);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let schema = Schema::builder("Widget")
        .member("a", |v: i32| Noisy::new("a", v))
        .member("b", |v: i32| Noisy::new("b", v))
        .member("c", |v: i32| Noisy::new("c", v))
        .on_setup(|_| println!("  widget body"))
        .on_teardown(|_| println!("  widget teardown"))
        .build()?;

    // 参数按 c, a, b 的顺序给出
    let args = InitArgs::new().arg("c", 3).arg("a", 1).arg("b", 2);
    println!("Arguments given as: {:?}", args.names().collect::<Vec<_>>());

    println!("Constructing:");
    let widget = OrderedComposite::construct(schema, args)?;

    println!("Destroying:");
    widget.destruct();

    Ok(())
}
