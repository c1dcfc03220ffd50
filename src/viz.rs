//! Chart and document rendering using Plotters

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::error::ScoreError;
use crate::model::ClusterModel;
use crate::pipeline::LabeledScores;
use crate::report::LabelCount;

/// A4 in points
pub const PAGE_SIZE: (u32, u32) = (595, 842);
pub const DOCUMENT_TITLE: &str = "Interest & Aptitude Report";
const DOCUMENT_FONT: &str = "sans-serif";

const BAR_COLORS: [RGBColor; 5] = [BLUE, RED, GREEN, MAGENTA, CYAN];

fn render_err(e: impl std::fmt::Display) -> ScoreError {
    ScoreError::Render(e.to_string())
}

/// Bar chart of students per label, bars in the order given
///
/// Writes SVG when `output_path` ends in `.svg`, PNG otherwise.
pub fn create_distribution_chart(counts: &[LabelCount], output_path: &Path) -> crate::Result<()> {
    let size = (800, 600);
    let is_svg = output_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_distribution(&root, counts).map_err(render_err)?;
        root.present().map_err(render_err)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_distribution(&root, counts).map_err(render_err)?;
        root.present().map_err(render_err)?;
    }

    info!(path = %output_path.display(), bars = counts.len(), "distribution chart saved");
    Ok(())
}

fn draw_distribution<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    counts: &[LabelCount],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let max_count = counts.iter().map(|c| c.count).max().unwrap_or(1) as u32;
    let labels: Vec<&str> = counts.iter().map(|c| c.label.as_str()).collect();

    let mut chart = ChartBuilder::on(root)
        .caption("Label Distribution", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d((0..counts.len()).into_segmented(), 0u32..max_count + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(counts.len().max(1))
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(i) => labels.get(*i).map(|l| l.to_string()).unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc("Label")
        .y_desc("Number of Students")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, count) in counts.iter().enumerate() {
        let color = BAR_COLORS[i % BAR_COLORS.len()];
        chart.draw_series(
            Histogram::vertical(&chart)
                .style(color.filled())
                .margin(20)
                .data(std::iter::once((i, count.count as u32))),
        )?;
    }

    Ok(())
}

/// Render a one-page summary for a single student as SVG
///
/// The page has a fixed size and font and only draws plain text, so no
/// font metrics are needed.
pub fn render_student_document(name: &str, cluster: usize, label: &str) -> crate::Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, PAGE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let title_style = TextStyle::from((DOCUMENT_FONT, 20).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(DOCUMENT_TITLE, (PAGE_SIZE.0 as i32 / 2, 40), title_style))
            .map_err(render_err)?;

        let body_style = TextStyle::from((DOCUMENT_FONT, 12).into_font());
        let lines = [
            format!("Name: {name}"),
            format!("Cluster: {cluster}"),
            format!("Label: {label}"),
        ];
        for (i, line) in lines.iter().enumerate() {
            let y = 100 + 30 * i as i32;
            root.draw(&Text::new(line.as_str(), (40, y), body_style.clone()))
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Print cluster statistics to console
pub fn print_cluster_statistics(labeled: &LabeledScores) {
    let model: &ClusterModel = &labeled.model;
    let total = labeled.data.len();

    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", model.n_clusters);
    println!("Total students: {}", total);
    println!("Within-cluster sum of squares (Inertia): {:.2}", model.inertia);

    let silhouette_score = model.compute_silhouette_sample(&labeled.data.features, 100);
    println!("Silhouette score (sample): {:.3}", silhouette_score);

    println!("\nClusters:");
    for profile in &labeled.profiles {
        let percentage = (profile.size as f64 / total as f64) * 100.0;
        println!(
            "  Cluster {}: {} students ({:.1}%), strongest in {} -> {}",
            profile.cluster, profile.size, percentage, profile.dominant_subject, profile.label
        );
    }

    println!("\nMean scores per cluster:");
    println!("  Cluster | {}", labeled.data.subjects.join(" | "));
    for profile in &labeled.profiles {
        let means: Vec<String> = profile
            .mean_scores
            .iter()
            .zip(labeled.data.subjects.iter())
            .map(|(m, s)| format!("{:>width$.1}", m, width = s.len()))
            .collect();
        println!("  {:7} | {}", profile.cluster, means.join(" | "));
    }
}
