use num_format::{Locale, ToFormattedString};
use prettytable::{Cell, Row, Table};

use crate::TbResult;

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub result: TbResult,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    fn sim_speed(&self) -> f64 {
        if self.time_secs > 0.0 {
            self.sim_time_ns / self.time_secs
        } else {
            0.0
        }
    }
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub tests: Vec<TestReport>,
    pub sim_time_ns: f64,
    pub real_time_secs: f64,
}

impl SimReport {
    pub fn passed(&self) -> bool {
        !self.tests.is_empty() && self.tests.iter().all(TestReport::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|t| !t.passed())
    }

    pub fn test(&self, name: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(
            ["Test", "Result", "Time (s)", "Sim time (ns)", "Sim speed (ns/s)", "Message"]
                .iter()
                .map(|h| Cell::new(h))
                .collect(),
        ));
        for t in &self.tests {
            let (result, message) = match &t.result {
                Ok(val) => ("passed", format!("{:?}", val)),
                Err(e) => ("failed", e.to_string()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&t.name),
                Cell::new(result),
                Cell::new(&format!("{:.3}", t.time_secs)),
                Cell::new(&(t.sim_time_ns as u64).to_formatted_string(&Locale::en)),
                Cell::new(&format!("{:.3}", t.sim_speed())),
                Cell::new(&message),
            ]));
        }
        table
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .summary_table()
            .to_string()
            .lines()
            .map(str::to_string)
            .collect();
        let sim_speed = if self.real_time_secs > 0.0 {
            self.sim_time_ns / self.real_time_secs
        } else {
            0.0
        };
        lines.push("TOTAL SIMULATION".to_string());
        lines.push(format!(
            "Simulation time: {} ns",
            (self.sim_time_ns as u64).to_formatted_string(&Locale::en)
        ));
        lines.push(format!("Real time: {:.3} s", self.real_time_secs));
        lines.push(format!("Simulation speed: {:.3} ns/s", sim_speed));
        lines
    }
}
