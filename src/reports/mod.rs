use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use signforge::aggregator::PredictionResult;
use signforge::competition::Standings;
use signforge::dataset::DatasetStats;
use signforge::landmarks::NormalizedHand;
use signforge::registry::ModelMetadata;
use signforge::session::{ConversationEntry, SessionStats};
use signforge::training::{DatasetReadiness, EpochMetrics};

pub enum FrameLine {
    NoHand,
    Failed(String),
    Predicted {
        result: PredictionResult,
        accepted: bool,
    },
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, columns: std::ops::RangeInclusive<usize>) {
    for i in columns {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn print_classifications(rows: &[(u64, FrameLine)]) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("ms").add_attribute(Attribute::Bold),
        Cell::new("Top").fg(Color::Cyan),
        Cell::new("P"),
        Cell::new("Runner-up"),
        Cell::new("Source"),
        Cell::new("Status"),
    ]);
    align_right(&mut table, 0..=0);

    for (ts, line) in rows {
        let row = match line {
            FrameLine::NoHand => vec![
                Cell::new(ts),
                Cell::new("-"),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
                Cell::new("no hand").fg(Color::DarkGrey),
            ],
            FrameLine::Failed(e) => vec![
                Cell::new(ts),
                Cell::new("-"),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
                Cell::new(e).fg(Color::Red),
            ],
            FrameLine::Predicted { result, accepted } => {
                let runner_up = result
                    .ranked
                    .get(1)
                    .map(|r| format!("{} ({:.2})", r.label, r.probability))
                    .unwrap_or_default();
                let status = if *accepted {
                    Cell::new("accepted").fg(Color::Green)
                } else {
                    Cell::new("low confidence").fg(Color::Yellow)
                };
                vec![
                    Cell::new(ts),
                    Cell::new(&result.top_label).fg(Color::Cyan),
                    Cell::new(format!("{:.3}", result.top_probability)),
                    Cell::new(runner_up),
                    Cell::new(&result.model),
                    status,
                ]
            }
        };
        table.add_row(row);
    }
    println!("\n{}", table);
}

pub fn print_model_list(models: &[ModelMetadata]) {
    if models.is_empty() {
        println!("📭 No saved models.");
        return;
    }
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Val Acc").fg(Color::Green),
        Cell::new("Train Acc"),
        Cell::new("Samples"),
        Cell::new("Gestures"),
        Cell::new("Epochs"),
        Cell::new("Train s"),
        Cell::new("ms/epoch"),
        Cell::new("Infer ms").fg(Color::Cyan),
        Cell::new("Params"),
        Cell::new("Created (UTC)"),
    ]);
    align_right(&mut table, 1..=9);

    for m in models {
        let run = &m.run;
        table.add_row(vec![
            Cell::new(&m.name).add_attribute(Attribute::Bold),
            Cell::new(format!("{:.1}%", m.accuracy * 100.0)).fg(Color::Green),
            Cell::new(format!("{:.1}%", run.train_accuracy * 100.0)),
            Cell::new(m.sample_count),
            Cell::new(m.gesture_count),
            Cell::new(m.epochs),
            Cell::new(format!("{:.1}", run.train_time_ms as f64 / 1000.0)),
            Cell::new(format!("{:.1}", run.avg_epoch_ms)),
            Cell::new(format!("{:.3}", run.inference_ms)).fg(Color::Cyan),
            Cell::new(run.parameters),
            Cell::new(m.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_dataset_stats(stats: &DatasetStats, readiness: &DatasetReadiness) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Label").add_attribute(Attribute::Bold),
        Cell::new("Samples"),
    ]);
    align_right(&mut table, 1..=1);
    for (label, count) in &stats.labels {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(stats.total_samples).add_attribute(Attribute::Bold),
    ]);
    println!("\n📊 Dataset\n{}", table);

    if !readiness.can_train() {
        println!("❌ Need at least 2 labels to train.");
    }
    for w in &readiness.warnings {
        println!("⚠️  {}", w);
    }
}

pub fn print_training_history(history: &[EpochMetrics]) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Epoch").add_attribute(Attribute::Bold),
        Cell::new("Loss"),
        Cell::new("Acc"),
        Cell::new("Val Loss").fg(Color::Cyan),
        Cell::new("Val Acc").fg(Color::Green),
    ]);
    align_right(&mut table, 0..=4);

    // First, last, and every tenth epoch in between.
    let last = history.len().saturating_sub(1);
    for m in history
        .iter()
        .filter(|m| m.epoch == 0 || m.epoch == last || (m.epoch + 1) % 10 == 0)
    {
        table.add_row(vec![
            Cell::new(m.epoch + 1),
            Cell::new(format!("{:.4}", m.train_loss)),
            Cell::new(format!("{:.3}", m.train_accuracy)),
            Cell::new(format!("{:.4}", m.validation_loss)).fg(Color::Cyan),
            Cell::new(format!("{:.3}", m.validation_accuracy)).fg(Color::Green),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_standings(standings: &Standings) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Classifier").add_attribute(Attribute::Bold),
        Cell::new("Wins").fg(Color::Green),
        Cell::new("Rounds"),
        Cell::new("Failures").fg(Color::Red),
        Cell::new("Mean P"),
        Cell::new("Mean ms"),
    ]);
    align_right(&mut table, 1..=5);

    let mut entries: Vec<_> = standings.entries.iter().collect();
    entries.sort_by(|a, b| b.wins.cmp(&a.wins));
    for s in entries {
        table.add_row(vec![
            Cell::new(&s.name).add_attribute(Attribute::Bold),
            Cell::new(s.wins).fg(Color::Green),
            Cell::new(s.rounds),
            Cell::new(s.failures).fg(Color::Red),
            Cell::new(format!("{:.3}", s.mean_confidence())),
            Cell::new(format!("{:.2}", s.mean_latency_ms())),
        ]);
    }
    println!("\n🏆 Standings\n{}", table);
}

pub fn print_conversation(history: &[ConversationEntry], stats: &SessionStats) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Words"),
        Cell::new("Sentence").fg(Color::Cyan),
    ]);
    for (i, entry) in history.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(entry.words.join(" ")),
            Cell::new(&entry.sentence).fg(Color::Cyan),
        ]);
    }
    println!("\n{}", table);
    println!(
        "frames {} | hands {} | rejected {} | accepted {} | emitted {} | sentences {}",
        stats.frames, stats.hands, stats.rejected, stats.accepted, stats.emitted, stats.sentences
    );
}

pub fn print_hand(hand: &NormalizedHand) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("x"),
        Cell::new("y"),
        Cell::new("z"),
    ]);
    align_right(&mut table, 0..=3);
    for (i, p) in hand.points().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(format!("{:+.3}", p.x)),
            Cell::new(format!("{:+.3}", p.y)),
            Cell::new(format!("{:+.3}", p.z)),
        ]);
    }
    println!("{}", table);
}
