use braid_interpreter::Lexer;
use braid_interpreter::lex::UnterminatedString;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(about = "An interpreter for a small stack-based scripting language")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dump the token stream of a program
    Tokenize { program: String },
    /// Dump the parsed program
    Parse { program: String },
    /// Evaluate a program, seeding the stack with the given parameters
    Run {
        program: String,
        parameters: Vec<String>,
    },
}

fn main() -> miette::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { program } => {
            for token in Lexer::new(&program) {
                let token = match token {
                    Ok(token) => token,
                    Err(e) => {
                        if let Some(unterminated) = e.downcast_ref::<UnterminatedString>() {
                            eprintln!(
                                "[{}:{}] Error: unterminated string",
                                unterminated.row, unterminated.col
                            );
                            eprintln!("{e:?}");

                            std::process::exit(65);
                        }
                        return Err(e);
                    }
                };
                println!("{token}");
            }
        }
        Commands::Parse { program } => {
            let parser = braid_interpreter::Parser::new(Lexer::new(&program))?;
            for node in parser.parse()? {
                println!("{node}");
            }
        }
        Commands::Run {
            program,
            parameters,
        } => {
            let rendered = braid_interpreter::run(&program, &parameters)?;
            print!("{rendered}");
        }
    }
    Ok(())
}
