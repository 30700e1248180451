//! GPT-2 export and generation timing

use anyhow::Result;
use enginebench_seq2seq::gpt2::gpt2_trt;

fn main() -> Result<()> {
    enginebench_cli::init_tracing();
    let result = gpt2_trt().run()?;
    println!("Results: {}", result);
    Ok(())
}
