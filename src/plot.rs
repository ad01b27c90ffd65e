use textplots::{Chart, Plot, Shape};

/// Renders one chart overlaying each trial's loss curve (epoch on the x axis)
/// in the terminal. One call per figure: training losses, validation losses.
pub fn plot_loss_curves(title: &str, histories: &[Vec<f64>]) {
    let epochs = histories.first().map_or(0, Vec::len);
    if epochs < 2 {
        return;
    }
    println!("{}", title);
    let series: Vec<Vec<(f32, f32)>> = histories
        .iter()
        .map(|history| {
            history
                .iter()
                .enumerate()
                .map(|(epoch, &loss)| (epoch as f32, loss as f32))
                .collect()
        })
        .collect();
    let shapes: Vec<Shape> = series
        .iter()
        .map(|points| Shape::Lines(points.as_slice()))
        .collect();

    let mut chart = Chart::new(180, 60, 0.0, (epochs - 1) as f32);
    let mut view = &mut chart;
    for shape in &shapes {
        view = view.lineplot(shape);
    }
    view.display();
}
