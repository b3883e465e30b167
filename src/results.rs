/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

## Examples

Creating a [`ResultsTable`] after running a simulation group:

```
use balance_sim::prelude::*;

let env = TestEnvironment::builder()
    .num_nodes(10)
    .topology(TopologyKind::Random)
    .latency_ms(50)
    .termination_time_ms(100_000)
    .build()
    .unwrap();

let sim = SimulationGroup::builder()
    .add_env(env)
    .repeat_all(3)
    .build()
    .unwrap();

let results_builder = sim.run_all().unwrap();

let results = results_builder
    .average(Average::Median) // Take the median of repeated simulations' results
    .converged()              // Include the fraction of runs which converged
    .format(Format::CSV)      // Output results as CSV
    .build();

println!("{}", results);
```

# Aggregating Results
Per-run measurements (fork duration, block counts, diameter) are combined
across repeats of the same environment with the chosen [`Average`].
Environment parameters and constants are taken from the first repeat.
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    simulation::SimulationOutput,
    utils::{wrap, WrapFunc},
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Typically produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<SimulationOutput>,
    format: Format,
    repeated: NonZeroUsize,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`].
    pub(crate) fn new(
        data: Vec<SimulationOutput>,
        repeated: NonZeroUsize,
    ) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    /// Include every built-in column.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.strategy_name()
            .environment()
            .converged()
            .blocks_mined()
            .adversary_blocks()
            .borrowed_blocks()
            .diameter()
    }

    /// Average the results of repeated simulations based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Include the "Adversary Blocks", "Released Blocks" and "Withheld
    /// Blocks" columns.
    pub fn adversary_blocks(mut self) -> Self {
        self.columns.insert(Column::AdversaryBlocks);
        self.columns.insert(Column::ReleasedBlocks);
        self.columns.insert(Column::WithheldBlocks);

        self
    }

    /// Include the "Blocks Mined" column.
    pub fn blocks_mined(mut self) -> Self {
        self.columns.insert(Column::BlocksMined);

        self
    }

    /// Include the "Borrowed Blocks" column.
    pub fn borrowed_blocks(mut self) -> Self {
        self.columns.insert(Column::BorrowedBlocks);

        self
    }

    /// Include a column with title `title` which only contains the given
    /// value.
    pub fn constant<T>(mut self, title: T, value: f64) -> Self
    where
        T: Into<String>,
    {
        self.columns.insert(Column::Constant(wrap!(title, move |_| value)));

        self
    }

    /// Include the "Converged" column: 1 if the fork was resolved before
    /// the termination time, 0 otherwise. Averaged, this is the fraction of
    /// converged runs.
    pub fn converged(mut self) -> Self {
        self.columns.insert(Column::Converged);

        self
    }

    /// Extract the raw [`SimulationOutput`] data from this [`ResultsBuilder`].
    /// Useful for running custom statistical analysis.
    ///
    /// # Ordering
    /// Simulations are run in the same order their environments were added
    /// to the [`SimulationGroupBuilder`](crate::simulation::SimulationGroupBuilder),
    /// with repeated runs being grouped together. The output data from this
    /// method follows this ordering as well.
    pub fn data(self) -> Vec<SimulationOutput> {
        self.data
    }

    /// Include the "Diameter" column.
    pub fn diameter(mut self) -> Self {
        self.columns.insert(Column::Diameter);

        self
    }

    /// Include the "Topology", "Nodes", "Degree", "Latency" and "Block
    /// Period" columns.
    pub fn environment(mut self) -> Self {
        self.columns.insert(Column::Topology);
        self.columns.insert(Column::Nodes);
        self.columns.insert(Column::Degree);
        self.columns.insert(Column::Latency);
        self.columns.insert(Column::BlockPeriod);

        self
    }

    /// Use the evil rate of each environment as input to `func`, and present
    /// the output in a table column with the given title.
    pub fn evil_rate_func<T, F>(mut self, title: T, func: F) -> Self
    where
        T: Into<String>,
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.columns.insert(Column::EvilRateFunction(wrap!(title, func)));

        self
    }

    /// Include the "Strategy" column.
    pub fn strategy_name(mut self) -> Self {
        self.columns.insert(Column::StrategyName);

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let ResultsBuilder { average, mut columns, data, format, repeated } =
            self;

        columns.insert(Column::EvilRate);
        columns.insert(Column::ForkDuration);
        match average {
            Average::None => (),
            _ => {
                columns.insert(Column::AverageOf(average));
            }
        }

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => data
                .iter()
                .map(|sim_output| {
                    row_of(&columns, |col_type| col_type.get_value(sim_output))
                })
                .collect(),
            _ => data
                .chunks(repeated.get())
                .map(|sim_outputs| {
                    row_of(&columns, |col_type| {
                        col_type.get_average_value(average, sim_outputs)
                    })
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }
}

#[cfg(feature = "rayon")]
fn row_of<F>(columns: &[Column], value_of: F) -> Vec<ColumnValue>
where
    F: Fn(&Column) -> ColumnValue + Send + Sync,
{
    columns.par_iter().map(value_of).collect()
}

#[cfg(not(feature = "rayon"))]
fn row_of<F>(columns: &[Column], value_of: F) -> Vec<ColumnValue>
where
    F: Fn(&Column) -> ColumnValue + Send + Sync,
{
    columns.iter().map(value_of).collect()
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles: Vec<_> =
            self.columns.iter().map(|col_type| col_type.to_string()).collect();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        let val = val.to_string();
                        text_widths[i] = text_widths[i].max(val.len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
                    write!(
                        f,
                        " {:1$} {2}",
                        title,
                        text_widths[i],
                        Self::SEPARATOR_VERTICAL
                    )?;
                }
                writeln!(f)?;

                let total_width = text_widths.iter().map(|x| x + 3).sum();
                for _ in 0..total_width {
                    write!(f, "{}", Self::SEPARATOR_HORIZONTAL)?;
                }

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Methods of extracting an average/central value from a set of repeated
/// simulations.
///
/// In the process of creating an results table, the given averaging method is
/// only applied to the values of columns which are measured per run.
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    StrategyName,
    Topology,
    Nodes,
    Degree,
    Latency,
    BlockPeriod,
    EvilRate,
    EvilRateFunction(WrapFunc<f64, f64>),
    Constant(WrapFunc<(), f64>),
    AverageOf(Average),
    ForkDuration,
    Converged,
    BlocksMined,
    AdversaryBlocks,
    ReleasedBlocks,
    WithheldBlocks,
    BorrowedBlocks,
    Diameter,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone)]
enum ColumnValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Column {
    /// Per-run measurement of this column, if it is one.
    fn measurement(&self, output: &SimulationOutput) -> Option<f64> {
        let value = match &self {
            Self::ForkDuration => output.fork_duration as f64,
            Self::Converged => {
                if output.converged() {
                    1.0
                } else {
                    0.0
                }
            }
            Self::BlocksMined => output.blocks_mined as f64,
            Self::AdversaryBlocks => output.adversary_blocks_mined as f64,
            Self::ReleasedBlocks => output.released_blocks as f64,
            Self::WithheldBlocks => output.withheld_blocks as f64,
            Self::BorrowedBlocks => output.borrowed_blocks as f64,
            Self::Diameter => output.diameter as f64,
            _ => return None,
        };

        Some(value)
    }

    fn get_value(&self, output: &SimulationOutput) -> ColumnValue {
        let env = &output.env;
        match &self {
            Self::StrategyName => ColumnValue::Text(output.strategy.clone()),
            Self::Topology => ColumnValue::Text(env.topology.to_string()),
            Self::Nodes => ColumnValue::Integer(env.num_nodes as i64),
            Self::Degree => ColumnValue::Integer(env.degree as i64),
            Self::Latency => ColumnValue::Integer(env.latency_ms),
            Self::BlockPeriod => ColumnValue::Float(env.average_block_period_ms),
            Self::EvilRate => ColumnValue::Float(env.evil_rate),
            Self::EvilRateFunction(func) => {
                ColumnValue::Float(func.call(env.evil_rate))
            }
            Self::Constant(s) => ColumnValue::Float(s.call(())),
            Self::Converged => {
                ColumnValue::Integer(output.converged() as i64)
            }
            Self::AverageOf(_) => unreachable!(
                "never need the single value of the average descriptor column"
            ),
            measured => match measured.measurement(output) {
                Some(value) => ColumnValue::Integer(value as i64),
                None => unreachable!("every column is handled above"),
            },
        }
    }

    fn get_average_value(
        &self,
        method: Average,
        data: &[SimulationOutput],
    ) -> ColumnValue {
        if let Self::AverageOf(_) = self {
            return ColumnValue::Integer(data.len() as i64);
        }

        let vls: Vec<_> =
            data.iter().filter_map(|output| self.measurement(output)).collect();
        if vls.is_empty() {
            return self.get_value(&data[0]);
        }

        let avg = match method {
            Average::Mean => vls.iter().sum::<f64>() / vls.len() as f64,
            Average::Median => crate::utils::median_of_floats(vls),
            Average::Max => vls.into_iter().fold(f64::NEG_INFINITY, f64::max),
            Average::Min => vls.into_iter().fold(f64::INFINITY, f64::min),
            Average::None => unreachable!(),
        };

        ColumnValue::Float(avg)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => unreachable!(),
            },
            Self::StrategyName => write!(f, "Strategy"),
            Self::Topology => write!(f, "Topology"),
            Self::Nodes => write!(f, "Nodes"),
            Self::Degree => write!(f, "Degree"),
            Self::Latency => write!(f, "Latency (ms)"),
            Self::BlockPeriod => write!(f, "Block Period (ms)"),
            Self::EvilRate => write!(f, "Evil Rate"),
            Self::EvilRateFunction(func) => write!(f, "{}", func.name()),
            Self::Constant(func) => write!(f, "{}", func.name()),
            Self::ForkDuration => write!(f, "Fork Duration (ms)"),
            Self::Converged => write!(f, "Converged"),
            Self::BlocksMined => write!(f, "Blocks Mined"),
            Self::AdversaryBlocks => write!(f, "Adversary Blocks"),
            Self::ReleasedBlocks => write!(f, "Released Blocks"),
            Self::WithheldBlocks => write!(f, "Withheld Blocks"),
            Self::BorrowedBlocks => write!(f, "Borrowed Blocks"),
            Self::Diameter => write!(f, "Diameter (ms)"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Text(text) => write!(f, "{}", text),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
        }
    }
}
