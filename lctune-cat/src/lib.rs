use colored::*;
use lctune::wire::*;

struct Writer<'b> {
    buffer: &'b mut String,
    indent: usize,
}

impl<'b> Writer<'b> {
    fn new(buffer: &'b mut String) -> Self {
        Self { buffer, indent: 0 }
    }

    fn increase_indent(&mut self) {
        self.indent += 2;
    }

    fn decrease_indent(&mut self) {
        self.indent -= 2;
    }

    fn writeln(&mut self, s: String) {
        self.buffer.push_str(&" ".repeat(self.indent));
        self.buffer.push_str(&s);
        self.buffer.push('\n');
    }
}

pub struct PacketParser {}

impl PacketParser {
    pub fn parse_hex(input: &str) -> Result<String> {
        let data = hex::decode(input).map_err(|_| Error)?;
        Self::parse(&data)
    }

    /// Identify the packet by its length and render it.
    pub fn parse(input: &[u8]) -> Result<String> {
        const REPORT_LENGTH: usize = CalibrationReport::<&[u8]>::LENGTH;
        const ASSIGNMENT_LENGTH: usize = CodeAssignment::<&[u8]>::LENGTH;
        const SENSOR_LENGTH: usize = SensorReport::<&[u8]>::LENGTH;

        let mut buffer = String::new();
        let mut w = Writer::new(&mut buffer);

        match input.len() {
            REPORT_LENGTH => {
                let report = CalibrationReport::new(input)?;
                w.writeln("Calibration Report".underline().bold().to_string());
                w.increase_indent();
                w.writeln(format!(
                    "{}: {}",
                    "sequence number".bold(),
                    report.sequence_number()
                ));
                w.writeln(format!("{}: {}", "channel".bold(), report.channel()));
                w.writeln(format!(
                    "{}: {}",
                    "command".bold(),
                    format!("{:?}", report.command()).bright_blue()
                ));
                w.writeln(format!(
                    "{}: {}",
                    "tuning code".bold(),
                    report.tuning_code()
                ));
                w.writeln(format!("{}: {:#06x}", "crc".bold(), report.crc()));
                w.decrease_indent();
            }
            ASSIGNMENT_LENGTH => {
                let assignment = CodeAssignment::new(input)?;
                w.writeln("Code Assignment".underline().bold().to_string());
                w.increase_indent();
                w.writeln(format!(
                    "{}: {}",
                    "sequence number".bold(),
                    assignment.sequence_number()
                ));
                w.writeln(format!("{}: {}", "channel".bold(), assignment.channel()));
                w.writeln(format!("{}", "tuning codes".bold()));
                w.increase_indent();
                let mut any = false;
                for (slot, code) in assignment.tuning_codes().enumerate() {
                    w.writeln(format!("{}: {}", format!("slot {slot}").italic(), code));
                    any = true;
                }
                if !any {
                    w.writeln("empty".italic().to_string());
                }
                w.decrease_indent();
                w.writeln(format!("{}: {:#06x}", "crc".bold(), assignment.crc()));
                w.decrease_indent();
            }
            SENSOR_LENGTH => {
                let report = SensorReport::new(input)?;
                w.writeln("Sensor Report".underline().bold().to_string());
                w.increase_indent();
                w.writeln(format!(
                    "{}: {}",
                    "sequence number".bold(),
                    report.sequence_number()
                ));
                w.writeln(format!("{}: {}", "channel".bold(), report.channel()));
                w.writeln(format!(
                    "{}: {}",
                    "tuning code".bold(),
                    report.tuning_code()
                ));
                let outputs: Vec<String> = (0..NUM_SENSOR_OUTPUTS)
                    .map(|index| report.output(index).to_string())
                    .collect();
                w.writeln(format!("{}: {}", "outputs".bold(), outputs.join(" ")));
                w.writeln(format!("{}: {:#06x}", "crc".bold(), report.crc()));
                w.decrease_indent();
            }
            _ => return Err(Error),
        }

        Ok(buffer)
    }
}
