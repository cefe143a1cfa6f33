use gamepack_lib::config::ToolConfig;
use gamepack_lib::platform::TargetSet;
use gamepack_lib::platform::os::Os;

use crate::output::print_stat;

pub fn cmd_info(config: &ToolConfig) {
  println!("gamepack {}", env!("CARGO_PKG_VERSION"));
  println!();
  println!("System:");
  match Os::current() {
    Some(os) => print_stat("Host", os.as_str()),
    _ => println!("  Could not detect host OS."),
  }
  let targets: Vec<String> = TargetSet::for_host().iter().map(|t| t.to_string()).collect();
  print_stat("Default targets", &targets.join(", "));

  println!();
  println!("Installation:");
  print_stat("Base directory", &config.base_dir.display().to_string());
  print_stat("Runtime", &presence(&config.runtime_dir()));
  print_stat("Extensions", &presence(&config.extensions_dir()));
  print_stat("Generated code", &config.generated_dir().display().to_string());
  print_stat("Working directory", &config.working_dir().display().to_string());
  print_stat("Compiler", &config.compiler.program);
}

fn presence(path: &std::path::Path) -> String {
  if path.exists() {
    path.display().to_string()
  } else {
    format!("{} (missing)", path.display())
  }
}
