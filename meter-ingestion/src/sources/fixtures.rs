//! Sample documents shared by the parser, reconciliation and HTTP tests.

pub const ESL_TARIFFS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ESLBillingData version="1.0">
  <Header version="1.0" created="2019-03-14T06:01:12" swSystemNameFrom="ESL" swSystemNameTo="ESL"/>
  <Meter factoryNo="38157930" internalNo="38157930">
    <TimePeriod end="2019-03-14T00:00:00">
      <ValueRow obis="1-1:1.8.1" valTimeStamp="" value="10" status="V"/>
      <ValueRow obis="1-1:1.8.2" valTimeStamp="" value="5" status="V"/>
      <ValueRow obis="1-1:2.8.1" valTimeStamp="" value="2.5" status="V"/>
      <ValueRow obis="1-1:2.8.2" valTimeStamp="" value="1" status="V"/>
      <ValueRow obis="1-1:2.29.0" valTimeStamp="" value="99" status="V"/>
    </TimePeriod>
  </Meter>
</ESLBillingData>
"#;

pub const ESL_WITH_BAD_ROWS: &str = r#"<ESLBillingData version="1.0">
  <Meter factoryNo="38157930">
    <TimePeriod end="not-a-date">
      <ValueRow obis="1-1:1.8.1" value="1"/>
    </TimePeriod>
    <TimePeriod end="2019-04-01T00:00:00">
      <ValueRow obis="1-1:1.8.1" value="1.5"/>
      <ValueRow obis="1-1:1.8.2" value="abc"/>
      <ValueRow obis="1-1:2.8.1" value="2" valueTimeStamp="yesterday"/>
    </TimePeriod>
  </Meter>
</ESLBillingData>
"#;

pub const ESL_VALUE_TIMESTAMP: &str = r#"<ESLBillingData version="1.0">
  <Meter factoryNo="38157930">
    <TimePeriod end="2019-03-14T00:00:00">
      <ValueRow obis="1-1:1.8.0" value="100" valueTimeStamp="2019-03-13T23:45:00"/>
      <ValueRow obis="1-1:2.8.0" value="20"/>
    </TimePeriod>
  </Meter>
</ESLBillingData>
"#;

pub const ESL_EMPTY_PERIOD: &str = r#"<ESLBillingData version="1.0">
  <Meter factoryNo="38157930">
    <TimePeriod end="2019-03-14T00:00:00">
      <ValueRow obis="1-1:1.8.1" value=""/>
    </TimePeriod>
    <TimePeriod end="2019-03-15T00:00:00"/>
  </Meter>
</ESLBillingData>
"#;

/// Two daily billing snapshots of the device meter.
pub const ESL_TWO_DAYS: &str = r#"<ESLBillingData version="1.0">
  <Meter factoryNo="38157930">
    <TimePeriod end="2019-03-13T00:00:00">
      <ValueRow obis="1-1:1.8.1" value="100"/>
      <ValueRow obis="1-1:1.8.2" value="50"/>
      <ValueRow obis="1-1:2.8.1" value="30"/>
      <ValueRow obis="1-1:2.8.2" value="10"/>
    </TimePeriod>
    <TimePeriod end="2019-03-14T00:00:00">
      <ValueRow obis="1-1:1.8.1" value="104"/>
      <ValueRow obis="1-1:1.8.2" value="52"/>
      <ValueRow obis="1-1:2.8.1" value="33"/>
      <ValueRow obis="1-1:2.8.2" value="10"/>
    </TimePeriod>
  </Meter>
</ESLBillingData>
"#;

pub const SDAT_PRODUCTION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rsm:ValidatedMeteredData_12 xmlns:rsm="http://www.strom.ch">
  <rsm:ValidatedMeteredData_HeaderInformation>
    <rsm:InstanceDocument>
      <rsm:DocumentID>eslevu180263_BR2294_ID735</rsm:DocumentID>
    </rsm:InstanceDocument>
  </rsm:ValidatedMeteredData_HeaderInformation>
  <rsm:MeteringData>
    <rsm:Interval>
      <rsm:StartDateTime>2019-03-13T23:00:00Z</rsm:StartDateTime>
      <rsm:EndDateTime>2019-03-14T23:00:00Z</rsm:EndDateTime>
    </rsm:Interval>
    <rsm:ProductionMeteringPoint>
      <rsm:VSENationalID>CH1018601234500000000000000011642</rsm:VSENationalID>
    </rsm:ProductionMeteringPoint>
    <rsm:Product>
      <rsm:ID>8716867000030</rsm:ID>
      <rsm:MeasureUnit>KWH</rsm:MeasureUnit>
    </rsm:Product>
    <rsm:Resolution>
      <rsm:Resolution>15</rsm:Resolution>
      <rsm:Unit>MIN</rsm:Unit>
    </rsm:Resolution>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>1</rsm:Sequence></rsm:Position>
      <rsm:Volume>0.1</rsm:Volume>
    </rsm:Observation>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>2</rsm:Sequence></rsm:Position>
      <rsm:Volume>0.2</rsm:Volume>
    </rsm:Observation>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>3</rsm:Sequence></rsm:Position>
      <rsm:Volume>0.4</rsm:Volume>
    </rsm:Observation>
  </rsm:MeteringData>
</rsm:ValidatedMeteredData_12>
"#;

pub const SDAT_NATIONAL_ID: &str = r#"<rsm:ValidatedMeteredData_12 xmlns:rsm="http://www.strom.ch">
  <rsm:ValidatedMeteredData_HeaderInformation>
    <rsm:InstanceDocument>
      <rsm:DocumentID>eslevu121963_BR2294</rsm:DocumentID>
    </rsm:InstanceDocument>
  </rsm:ValidatedMeteredData_HeaderInformation>
  <rsm:MeteringData>
    <rsm:Interval>
      <rsm:StartDateTime>2019-03-13T23:00:00</rsm:StartDateTime>
      <rsm:EndDateTime>2019-03-14T23:00:00</rsm:EndDateTime>
    </rsm:Interval>
    <rsm:ConsumptionMeteringPoint>
      <rsm:VSENationalID>CH1018601234500000000000000011642</rsm:VSENationalID>
    </rsm:ConsumptionMeteringPoint>
    <rsm:Product>
      <rsm:MeasureUnit>KWH</rsm:MeasureUnit>
    </rsm:Product>
    <rsm:Resolution>
      <rsm:Resolution>15</rsm:Resolution>
      <rsm:Unit>MIN</rsm:Unit>
    </rsm:Resolution>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>1</rsm:Sequence></rsm:Position>
      <rsm:Volume>0.5</rsm:Volume>
    </rsm:Observation>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>x</rsm:Sequence></rsm:Position>
      <rsm:Volume>1.0</rsm:Volume>
    </rsm:Observation>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>3</rsm:Sequence></rsm:Position>
      <rsm:Volume>n/a</rsm:Volume>
    </rsm:Observation>
    <rsm:Observation>
      <rsm:Position><rsm:Sequence>4</rsm:Sequence></rsm:Position>
      <rsm:Volume>0.75</rsm:Volume>
    </rsm:Observation>
  </rsm:MeteringData>
</rsm:ValidatedMeteredData_12>
"#;

pub const SDAT_STRUCTURAL_GAPS: &str = r#"<ValidatedMeteredData_12>
  <DocumentID>eslevu180263_BR2294_ID742</DocumentID>
  <MeteringData>
    <ConsumptionMeteringPoint><VSENationalID>A</VSENationalID></ConsumptionMeteringPoint>
    <Resolution><Resolution>15</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>1</Volume></Observation>
  </MeteringData>
  <MeteringData>
    <Interval><StartDateTime>2019-03-13T23:00:00</StartDateTime></Interval>
    <ConsumptionMeteringPoint><VSENationalID>A</VSENationalID></ConsumptionMeteringPoint>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>1</Volume></Observation>
  </MeteringData>
  <MeteringData>
    <Interval><StartDateTime>2019-03-13T23:00:00</StartDateTime></Interval>
    <ConsumptionMeteringPoint><VSENationalID>A</VSENationalID></ConsumptionMeteringPoint>
    <Resolution><Resolution>15</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>1</Volume></Observation>
    <Observation><Volume>2</Volume></Observation>
  </MeteringData>
</ValidatedMeteredData_12>
"#;

pub const SDAT_NO_METERING_POINT: &str = r#"<ValidatedMeteredData_12>
  <DocumentID>eslevu180263_BR2294_ID742</DocumentID>
  <MeteringData>
    <Interval>
      <StartDateTime>2019-03-13T23:00:00</StartDateTime>
      <EndDateTime>2019-03-14T23:00:00</EndDateTime>
    </Interval>
    <Product><MeasureUnit>KWH</MeasureUnit></Product>
    <Resolution><Resolution>60</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>1.5</Volume></Observation>
  </MeteringData>
</ValidatedMeteredData_12>
"#;

/// Consumption deltas for the day after the last ESL snapshot of
/// [`ESL_TWO_DAYS`].
pub const SDAT_CONSUMPTION_DAY: &str = r#"<ValidatedMeteredData_12>
  <DocumentID>eslevu180263_BR2294_ID742</DocumentID>
  <MeteringData>
    <Interval>
      <StartDateTime>2019-03-14T00:00:00</StartDateTime>
      <EndDateTime>2019-03-14T01:00:00</EndDateTime>
    </Interval>
    <ConsumptionMeteringPoint><VSENationalID>CH10186</VSENationalID></ConsumptionMeteringPoint>
    <Product><MeasureUnit>KWH</MeasureUnit></Product>
    <Resolution><Resolution>15</Resolution><Unit>MIN</Unit></Resolution>
    <Observation><Position><Sequence>2</Sequence></Position><Volume>2</Volume></Observation>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>1</Volume></Observation>
    <Observation><Position><Sequence>3</Sequence></Position><Volume>0.5</Volume></Observation>
  </MeteringData>
</ValidatedMeteredData_12>
"#;

pub const UNKNOWN_ROOT: &str = "<Invoice><Total>12</Total></Invoice>";

/// Production block followed by a consumption block, no sensor in the
/// document id. The leading block has no metering point.
pub const SDAT_MIXED_POINTS: &str = r#"<ValidatedMeteredData_12>
  <DocumentID>eslevu121963_BR2294</DocumentID>
  <MeteringData>
    <Interval><StartDateTime>2019-03-12T23:00:00</StartDateTime></Interval>
    <Resolution><Resolution>15</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>9</Volume></Observation>
  </MeteringData>
  <MeteringData>
    <Interval><StartDateTime>2019-03-13T23:00:00</StartDateTime></Interval>
    <ProductionMeteringPoint><VSENationalID>P</VSENationalID></ProductionMeteringPoint>
    <Resolution><Resolution>15</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>0.5</Volume></Observation>
  </MeteringData>
  <MeteringData>
    <Interval><StartDateTime>2019-03-14T23:00:00</StartDateTime></Interval>
    <ConsumptionMeteringPoint><VSENationalID>C</VSENationalID></ConsumptionMeteringPoint>
    <Resolution><Resolution>15</Resolution></Resolution>
    <Observation><Position><Sequence>1</Sequence></Position><Volume>0.25</Volume></Observation>
  </MeteringData>
</ValidatedMeteredData_12>
"#;
