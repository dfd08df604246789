//! Incremental least-squares line fit, used for trend-line series.

/// Simple linear regression over `(x, y)` observations.
///
/// Sums are maintained incrementally (Welford-style updating of the means and the
/// centered cross/self products), so the series never needs to be buffered.
///
/// Degenerate input is not an error: with fewer than two observations the slope
/// is `NaN`, and with all-equal x values it becomes `NaN`/`Infinity` by IEEE-754
/// semantics. Callers must tolerate that in derived output.
#[derive(Debug, Clone, Default)]
pub struct SimpleRegression {
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
    n: u64,
    x_bar: f64,
    y_bar: f64,
}

impl SimpleRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data(&mut self, x: f64, y: f64) {
        if self.n == 0 {
            self.x_bar = x;
            self.y_bar = y;
        } else {
            let dx = x - self.x_bar;
            let dy = y - self.y_bar;
            let n = self.n as f64;
            self.sum_xx += dx * dx * n / (n + 1.0);
            self.sum_xy += dx * dy * n / (n + 1.0);
            self.x_bar += dx / (n + 1.0);
            self.y_bar += dy / (n + 1.0);
        }

        self.sum_x += x;
        self.sum_y += y;
        self.n += 1;
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// `NaN` when fewer than two observations have been added.
    pub fn slope(&self) -> f64 {
        if self.n < 2 {
            return f64::NAN;
        }
        self.sum_xy / self.sum_xx
    }

    pub fn intercept(&self, slope: f64) -> f64 {
        (self.sum_y - slope * self.sum_x) / self.n as f64
    }

    /// Predicted y at `x` using the currently accumulated slope.
    pub fn predict(&self, x: f64) -> f64 {
        let slope = self.slope();
        self.intercept(slope) + slope * x
    }
}
