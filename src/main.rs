use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
  let args: Vec<String> = std::env::args().skip(1).collect();

  match daygo_lib::run(args).await {
    Ok(output) => {
      println!("{}", output);
      ExitCode::SUCCESS
    }
    Err(e) => {
      eprintln!("{}", e);
      ExitCode::FAILURE
    }
  }
}
