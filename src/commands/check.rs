use colored::Colorize;

use nic_owner::config::Config;

pub fn run(config: &Config) -> anyhow::Result<()> {
    println!("{}", "nic-owner check".bold());
    println!("  target:    {}", super::describe_target(config));

    match super::connect(config) {
        Ok(owner) => {
            println!("  platform:  {}", owner.platform().to_string().green());
            if let Some(ip) = owner.connection().source_ip() {
                println!("  source ip: {}", ip);
            }
            Ok(())
        }
        Err(e) => {
            println!("  platform:  {}", "unsupported".red());
            Err(e)
        }
    }
}
