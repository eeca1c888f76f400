use clap::Args;
use signforge::error::SfResult;
use signforge::sentence::{naturalize, synthesize_words};

#[derive(Args, Debug, Clone)]
pub struct SentenceArgs {
    /// Words in recognition order.
    #[arg(
        num_args = 1..,
        required_unless_present = "verb",
        conflicts_with_all = ["subject", "objects", "verb"]
    )]
    pub words: Vec<String>,

    /// Build from explicit roles instead of recognition order.
    #[arg(long, requires = "verb")]
    pub subject: Option<String>,

    /// Repeat for several objects, in order.
    #[arg(long = "object", requires = "verb")]
    pub objects: Vec<String>,

    #[arg(long, requires = "subject")]
    pub verb: Option<String>,
}

pub fn run(args: SentenceArgs) -> SfResult<()> {
    let sentence = match (&args.subject, &args.verb) {
        (Some(subject), Some(verb)) => {
            let objects: Vec<&str> = args.objects.iter().map(String::as_str).collect();
            naturalize(subject, &objects, verb)
        }
        _ => {
            let words: Vec<&str> = args.words.iter().map(String::as_str).collect();
            synthesize_words(&words)
        }
    };
    println!("{}", sentence);
    Ok(())
}
