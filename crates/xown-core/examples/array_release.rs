//! 数组缓冲区 + 自定义释放动作
//!
//! 使用方法:
//! ```bash
//! RUST_LOG=xown_core=trace cargo run --example array_release
//! ```

use tracing_subscriber::EnvFilter;
use xown_core::{release_array, ArrayRelease, RawBuffer, SharedResource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 释放动作：按数组形式回收
    let action: fn(RawBuffer<i32>) = release_array::<i32>;
    let res = SharedResource::create(RawBuffer::from_vec(vec![1, 2, 3]), action);
    println!("Created resource: {:?}", res);

    // 只有精确的类型才能取回释放动作
    println!(
        "query fn(RawBuffer<i32>): {}",
        res.query_action::<fn(RawBuffer<i32>)>().is_some()
    );
    println!(
        "query ArrayRelease: {}",
        res.query_action::<ArrayRelease>().is_some()
    );

    let copy = res.clone();
    println!("use_count after clone: {}", res.use_count());

    // 通过查询修改共享的释放动作，所有句柄都会看到
    if let Some(mut stored) = copy.query_action::<fn(RawBuffer<i32>)>() {
        *stored = |buf: RawBuffer<i32>| {
            println!("Releasing {} elements", buf.len());
            release_array(buf);
        };
    }

    drop(res);
    println!("Dropped first handle, data still readable: {:?}", copy.as_slice());
    drop(copy);

    Ok(())
}
