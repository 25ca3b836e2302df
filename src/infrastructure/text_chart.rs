use crate::application::{HourlyCount, ReportRenderer};

/// Horizontal bar chart in monospace text, one row per hour.
pub struct TextChartRenderer {
    width: usize,
}

impl TextChartRenderer {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }
}

impl Default for TextChartRenderer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ReportRenderer for TextChartRenderer {
    fn render(&self, counts: &[HourlyCount]) -> String {
        let max = counts.iter().map(|c| c.count).max().unwrap_or(0);
        if max == 0 {
            return String::new();
        }
        counts
            .iter()
            .map(|c| {
                // at least one block for any non-zero hour
                let len = ((c.count as f64 / max as f64) * self.width as f64).ceil() as usize;
                format!("{:02}h {} {}", c.hour, "█".repeat(len.max(1)), c.count)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_bars_to_busiest_hour() {
        let r = TextChartRenderer::new(4);
        let out = r.render(&[
            HourlyCount { hour: 7, count: 1 },
            HourlyCount { hour: 13, count: 4 },
        ]);
        assert_eq!(out, "07h █ 1\n13h ████ 4");
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(TextChartRenderer::default().render(&[]), "");
    }
}
