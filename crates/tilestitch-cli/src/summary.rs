use console::Style;
use tilestitch_core::pipeline::config::StitchingConfig;
use tilestitch_core::pipeline::{StitchingOutput, StitchingPlan};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            warning: Style::new().yellow(),
        }
    }
}

pub fn print_plan_summary(config: &StitchingConfig, plan: &StitchingPlan) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Tile Stitching"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    println!("  {}", s.header.apply_to("Grouping"));
    for (attribute, choice) in config.grouping.iter() {
        println!(
            "    {:<14}{}",
            s.label.apply_to(attribute),
            s.value.apply_to(choice)
        );
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Combine"),
        s.method.apply_to(config.combine)
    );
    println!();

    println!("  {}", s.header.apply_to("Registration"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Views"),
        s.value.apply_to(plan.views.len())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Pairs"),
        s.value.apply_to(plan.pairs.len())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Fixed"),
        s.value.apply_to(plan.fixed.len())
    );
    println!(
        "    {:<14}{:?}",
        s.label.apply_to("Downsample"),
        config.downsample
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Min r"),
        s.value.apply_to(config.pairwise.min_correlation)
    );
    println!();
}

pub fn print_solution_summary(output: &StitchingOutput) {
    let s = Styles::new();
    let solution = &output.solution;

    println!();
    println!("  {}", s.header.apply_to("Global Optimization"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Model"),
        s.method.apply_to(output.problem.model)
    );
    println!(
        "    {:<14}{} of {}",
        s.label.apply_to("Registered"),
        s.value.apply_to(output.results.len()),
        output.pairs.len()
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Links"),
        s.value.apply_to(solution.links.len())
    );
    if !solution.removed.is_empty() {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Removed"),
            s.warning.apply_to(solution.removed.len())
        );
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("Mean error"),
        s.value.apply_to(format!("{:.3} px", solution.mean_error()))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Max error"),
        s.value.apply_to(format!("{:.3} px", solution.max_error()))
    );
}
