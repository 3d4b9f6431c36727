quantity!(
    /// Energy price per kilowatt-hour, in whatever currency the price source reports.
    KilowattHourRate,
    "¤/kWh",
    4
);
